use crate::error::DelegationError;
use crate::graphql;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;

/// Returns the value at `path` in a delegated response.
///
/// An error reported by the delegate at exactly `path` wins over the data. Otherwise every
/// segment of `path` must be present in the data; an explicit `null` is a present value.
pub(crate) fn extract_at(
    path: &Path,
    response: &graphql::Response,
) -> Result<Value, DelegationError> {
    if let Some(error) = response
        .errors
        .iter()
        .find(|error| error.path.as_ref() == Some(path))
    {
        return Err(DelegationError::Located(error.clone()));
    }

    // A response without data is walked as an empty object
    let Some(data) = response.data.as_ref().filter(|data| !data.is_null()) else {
        return if path.is_empty() {
            Ok(Value::Object(Default::default()))
        } else {
            Err(DelegationError::MissingValue(path.clone()))
        };
    };
    data.get_path(path)
        .cloned()
        .ok_or_else(|| DelegationError::MissingValue(path.clone()))
}
