//! Rewrites the operation sent to a delegate so that every object it returns reports its
//! concrete `__typename`.
//!
//! Selection sets on the operation's root type are left alone: a root type is never abstract,
//! and a subscription root may only select its single field.
//!
//! The host operation is never modified: `Node` is copy-on-write, so only the selection sets
//! along rewritten paths are copied.

use std::collections::HashSet;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::Type;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::Fragment;
use apollo_compiler::executable::FragmentMap;
use apollo_compiler::executable::Operation;
use apollo_compiler::executable::Selection;
use apollo_compiler::executable::SelectionSet;
use apollo_compiler::name;

const TYPENAME: &str = "__typename";

/// Returns a copy of `operation`, and of the fragments it references, where every non-empty
/// selection set below the root type selects `__typename`.
///
/// Only fragments reachable from the operation are returned, in document order.
pub(crate) fn with_typenames(
    operation: &Node<Operation>,
    fragments: &FragmentMap,
) -> (Node<Operation>, Vec<Node<Fragment>>) {
    let root = operation.selection_set.ty.clone();
    let mut operation = operation.clone();
    add_typename(&mut operation.make_mut().selection_set, &root);

    let referenced = referenced_fragments(&operation.selection_set, fragments);
    let fragments = fragments
        .values()
        .filter(|fragment| referenced.contains(&fragment.name))
        .map(|fragment| {
            let mut fragment = fragment.clone();
            add_typename(&mut fragment.make_mut().selection_set, &root);
            fragment
        })
        .collect();
    (operation, fragments)
}

/// Adds `__typename` to `selection_set` and to every nested selection set, except those on
/// the `root` type.
///
/// Selection sets of leaf fields stay empty, and a level that already selects the
/// `__typename` meta-field under its own name is left as it is. An alias of another field
/// named `__typename` does not count.
fn add_typename(selection_set: &mut SelectionSet, root: &Name) {
    for selection in &mut selection_set.selections {
        match selection {
            Selection::Field(field) => {
                if !field.selection_set.selections.is_empty() {
                    add_typename(&mut field.make_mut().selection_set, root);
                }
            }
            Selection::InlineFragment(inline) => {
                add_typename(&mut inline.make_mut().selection_set, root)
            }
            // Fragment definitions are rewritten on their own
            Selection::FragmentSpread(_) => {}
        }
    }
    if selection_set.selections.is_empty() || selection_set.ty == *root {
        return;
    }
    let has_typename = selection_set.selections.iter().any(|selection| {
        matches!(
            selection,
            Selection::Field(field) if field.name == TYPENAME && field.response_key() == TYPENAME
        )
    });
    if !has_typename {
        selection_set
            .selections
            .push(Selection::Field(typename_field()));
    }
}

fn typename_field() -> Node<Field> {
    let definition = ast::FieldDefinition {
        description: None,
        name: name!("__typename"),
        arguments: Vec::new(),
        ty: Type::NonNullNamed(name!("String")),
        directives: Default::default(),
    };
    Node::new(Field::new(name!("__typename"), Node::new(definition)))
}

/// Names of the fragments spread from `selection_set`, directly or through other fragments.
fn referenced_fragments<'a>(
    selection_set: &'a SelectionSet,
    fragments: &'a FragmentMap,
) -> HashSet<&'a Name> {
    let mut referenced = HashSet::new();
    let mut pending = vec![selection_set];
    while let Some(selection_set) = pending.pop() {
        for selection in &selection_set.selections {
            match selection {
                Selection::Field(field) => pending.push(&field.selection_set),
                Selection::InlineFragment(inline) => pending.push(&inline.selection_set),
                Selection::FragmentSpread(spread) => {
                    if referenced.insert(&spread.fragment_name)
                        && let Some(fragment) = fragments.get(&spread.fragment_name)
                    {
                        pending.push(&fragment.selection_set);
                    }
                }
            }
        }
    }
    referenced
}

#[cfg(test)]
mod tests {
    use apollo_compiler::ExecutableDocument;
    use apollo_compiler::Schema;
    use apollo_compiler::validation::Valid;

    use super::*;

    const SDL: &str = r#"
        type Query {
            dummy: String
            hero: Character
            heroes: [Character]
        }
        type Subscription { hero: Character }
        interface Character { name: String! friends: [Character] }
        type Human implements Character { name: String! friends: [Character] height: Float }
        type Droid implements Character { name: String! friends: [Character] }
    "#;

    fn document(query: &str) -> (Valid<Schema>, Valid<ExecutableDocument>) {
        let schema = Schema::parse_and_validate(SDL, "schema.graphql").unwrap();
        let document =
            ExecutableDocument::parse_and_validate(&schema, query, "query.graphql").unwrap();
        (schema, document)
    }

    fn typename_count(selection_set: &SelectionSet) -> usize {
        selection_set
            .fields()
            .filter(|field| field.name == TYPENAME && field.response_key() == TYPENAME)
            .count()
    }

    fn field<'a>(selection_set: &'a SelectionSet, key: &str) -> &'a Node<Field> {
        selection_set
            .fields()
            .find(|field| field.response_key() == key)
            .unwrap()
    }

    #[test]
    fn every_object_selection_gets_a_typename() {
        let (_, document) = document(
            r#"{
                dummy
                hero { name friends { name ... on Human { height } } }
            }"#,
        );
        let operation = document.operations.get(None).unwrap();
        let (rewritten, fragments) = with_typenames(operation, &document.fragments);

        assert!(fragments.is_empty());
        assert_eq!(typename_count(&rewritten.selection_set), 0);
        assert!(field(&rewritten.selection_set, "dummy").selection_set.selections.is_empty());

        let hero = field(&rewritten.selection_set, "hero");
        assert_eq!(typename_count(&hero.selection_set), 1);
        let friends = field(&hero.selection_set, "friends");
        assert_eq!(typename_count(&friends.selection_set), 1);
        let Selection::InlineFragment(inline) = &friends.selection_set.selections[1] else {
            panic!("expected the inline fragment to stay in place");
        };
        assert_eq!(typename_count(&inline.selection_set), 1);
    }

    #[test]
    fn the_original_operation_is_not_modified() {
        let (_, document) = document("{ hero { name } }");
        let operation = document.operations.get(None).unwrap();
        let before = operation.serialize().no_indent().to_string();

        let (rewritten, _) = with_typenames(operation, &document.fragments);

        assert_eq!(operation.serialize().no_indent().to_string(), before);
        assert_ne!(rewritten.serialize().no_indent().to_string(), before);
        assert_eq!(
            typename_count(&field(&operation.selection_set, "hero").selection_set),
            0
        );
    }

    #[test]
    fn existing_typenames_are_not_duplicated() {
        let (_, document) = document("{ hero { __typename name } }");
        let operation = document.operations.get(None).unwrap();
        let (once, _) = with_typenames(operation, &document.fragments);
        let (twice, _) = with_typenames(&once, &document.fragments);

        let hero = field(&twice.selection_set, "hero");
        assert_eq!(typename_count(&hero.selection_set), 1);
        assert_eq!(hero.selection_set.selections.len(), 2);
        assert_eq!(
            once.serialize().no_indent().to_string(),
            twice.serialize().no_indent().to_string()
        );
    }

    #[test]
    fn only_referenced_fragments_are_kept_and_rewritten() {
        let (_, document) = document(
            r#"
            query Heroes { heroes { ...HeroFields } }
            query Hero { hero { ...Named } }
            fragment HeroFields on Character { name friends { ...Named } }
            fragment Named on Character { name }
            "#,
        );
        let operation = document.operations.get(Some("Heroes")).unwrap();
        let (rewritten, fragments) = with_typenames(operation, &document.fragments);

        let names: Vec<_> = fragments.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["HeroFields", "Named"]);
        for fragment in &fragments {
            assert_eq!(typename_count(&fragment.selection_set), 1);
        }
        let heroes = field(&rewritten.selection_set, "heroes");
        assert_eq!(typename_count(&heroes.selection_set), 1);

        // Unused fragments are dropped
        let operation = document.operations.get(Some("Hero")).unwrap();
        let (_, fragments) = with_typenames(operation, &document.fragments);
        let names: Vec<_> = fragments.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Named"]);
        assert_eq!(typename_count(&document.fragments["Named"].selection_set), 0);
    }

    #[test]
    fn root_selections_are_left_alone() {
        let (schema, document) = document(
            r#"
            subscription Watch { hero { name } }
            query Roots { ...Root }
            fragment Root on Query { dummy hero { name } }
            "#,
        );
        let operation = document.operations.get(Some("Watch")).unwrap();
        let (rewritten, _) = with_typenames(operation, &document.fragments);
        assert_eq!(
            rewritten.serialize().no_indent().to_string(),
            "subscription Watch { hero { name __typename } }"
        );
        // A subscription root with a single field stays valid
        ExecutableDocument::parse_and_validate(
            &schema,
            rewritten.serialize().no_indent().to_string(),
            "subscription.graphql",
        )
        .unwrap();

        let operation = document.operations.get(Some("Roots")).unwrap();
        let (rewritten, fragments) = with_typenames(operation, &document.fragments);
        assert_eq!(typename_count(&rewritten.selection_set), 0);
        assert_eq!(typename_count(&fragments[0].selection_set), 0);
        let hero = field(&fragments[0].selection_set, "hero");
        assert_eq!(typename_count(&hero.selection_set), 1);
    }

    #[test]
    fn an_alias_named_typename_does_not_hide_the_meta_field() {
        let (_, document) = document("{ hero { __typename: name } }");
        let operation = document.operations.get(None).unwrap();
        let (rewritten, _) = with_typenames(operation, &document.fragments);

        let hero = field(&rewritten.selection_set, "hero");
        assert_eq!(hero.selection_set.selections.len(), 2);
        assert_eq!(typename_count(&hero.selection_set), 1);
        assert!(
            hero.selection_set
                .fields()
                .any(|field| field.name == "name" && field.response_key() == TYPENAME)
        );
    }
}
