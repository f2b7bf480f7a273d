//! Metadata resolution as seen through the writer's registry.

mod support;

use std::sync::Arc;

use support::{Account, Customer, RecordingConnection};
use tablemap::{
    AccessType, Accessors, ClassDecl, Entity, Error, Introspected, Mapping, Member, OrmWriter,
};

fn access_of<T>(meta: &Introspected<T>) -> Vec<(&'static str, AccessType)> {
    meta.attributes()
        .iter()
        .map(|a| (a.info().name, a.info().access))
        .collect()
}

#[test]
fn repeated_resolution_yields_the_same_variants() {
    let writer = OrmWriter::with_cache_size(8);
    let first = writer.introspect::<Account>().unwrap();
    let second = writer.introspect::<Account>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let fresh = Introspected::<Account>::resolve().unwrap();
    assert_eq!(access_of(&first), access_of(&fresh));
    assert_eq!(*first, fresh);

    writer.clear_caches();
    let again = writer.introspect::<Account>().unwrap();
    assert!(!Arc::ptr_eq(&first, &again));
    assert_eq!(access_of(&first), access_of(&again));
}

#[test]
fn accessors_split_across_levels_are_merged() {
    let writer = OrmWriter::with_cache_size(8).generic_binding(false);
    let meta = writer.introspect::<Account>().unwrap();

    assert_eq!(
        access_of(&meta),
        vec![
            ("balance", AccessType::Property),
            ("audit_code", AccessType::Property),
            ("id", AccessType::Property),
        ]
    );
    let balance = meta.attribute("balance").unwrap();
    assert_eq!(balance.info().column.raw(), "balance_cents");
    assert!(balance.info().is_insertable());

    // Getter without setter: resolved, but never persisted.
    let audit = meta.attribute("audit_code").unwrap();
    assert!(!audit.info().to_be_considered);
    assert!(!audit.info().is_insertable());

    let mut conn = RecordingConnection::new();
    let mut account = Account {
        balance: 250,
        ..Account::default()
    };
    writer.insert(&mut conn, &mut account).unwrap();
    assert_eq!(conn.last_sql(), "INSERT INTO Account(balance_cents) VALUES (?)");
    assert_eq!(account.id, 100);
}

#[derive(Default)]
struct Mixed {
    id: i64,
    label: String,
}

fn mixed_levels(label: Member<Mixed>) -> Mapping<Mixed> {
    Mapping::new().level(
        ClassDecl::entity("Mixed")
            .member(Member::field("id", Accessors::scalar(|m: &Mixed| m.id, |m, v| m.id = v)).id())
            .member(label),
    )
}

fn label_property() -> Member<Mixed> {
    Member::property(
        "label",
        Accessors::scalar(|m: &Mixed| m.label.clone(), |m, v| m.label = v),
    )
}

fn label_field() -> Member<Mixed> {
    Member::field(
        "label",
        Accessors::scalar(|m: &Mixed| m.label.clone(), |m, v| m.label = v),
    )
}

impl Entity for Mixed {
    fn mapping() -> Mapping<Self> {
        mixed_levels(label_field().column("label_text"))
    }
}

#[test]
fn marked_field_and_property_on_one_level_default_to_field() {
    let mapping = Mapping::new().level(
        ClassDecl::entity("Mixed")
            .member(Member::field("id", Accessors::scalar(|m: &Mixed| m.id, |m, v| m.id = v)).id())
            .member(label_property().column("label_text"))
            .member(label_field()),
    );
    let meta = Introspected::from_mapping(&mapping).unwrap();
    assert_eq!(
        access_of(&meta),
        vec![("id", AccessType::Field), ("label", AccessType::Field)]
    );
}

#[test]
fn wrong_kind_overrides_are_rejected() {
    let method_as_field = mixed_levels(label_property().access(AccessType::Field));
    match Introspected::from_mapping(&method_as_field) {
        Err(Error::Metadata(e)) => {
            assert_eq!(e.message, "A method can not be of access type field");
            assert_eq!(e.attribute.as_deref(), Some("label"));
        }
        other => panic!("expected metadata error, got {:?}", other.err()),
    }

    let field_as_property = mixed_levels(label_field().access(AccessType::Property));
    match Introspected::from_mapping(&field_as_property) {
        Err(Error::Metadata(e)) => {
            assert_eq!(e.message, "A field can not be of access type property");
        }
        other => panic!("expected metadata error, got {:?}", other.err()),
    }
}

#[test]
fn resolution_details_are_exposed() {
    let writer = OrmWriter::with_cache_size(8);
    let meta = writer.introspect::<Customer>().unwrap();

    assert_eq!(meta.delimited_table_name(), "customers");
    assert_eq!(meta.id_column_names(), vec!["id"]);
    assert!(meta.has_generated_id());
    assert!(!meta.has_self_join_column());
    assert!(meta.attribute("notes").unwrap().info().transient);
    assert_eq!(
        meta.attribute_by_column("created_at").map(|a| a.info().name),
        Some("created")
    );
    assert!(meta.is_new(&Customer::default()).unwrap());
}

#[derive(Default)]
struct Person {
    id: i64,
    name: String,
    age: i32,
}

impl Entity for Person {
    fn mapping() -> Mapping<Self> {
        Mapping::new()
            .level(
                ClassDecl::mapped_superclass("Named")
                    .member(
                        Member::field("id", Accessors::scalar(|p: &Person| p.id, |p, v| p.id = v))
                            .id()
                            .generated(),
                    )
                    .member(Member::field(
                        "name",
                        Accessors::scalar(|p: &Person| p.name.clone(), |p, v| p.name = v),
                    )),
            )
            .level(
                ClassDecl::entity("Person")
                    .table("people")
                    .member(
                        Member::property(
                            "name",
                            Accessors::scalar(|p: &Person| p.name.clone(), |p, v| p.name = v),
                        )
                        .column("full_name"),
                    )
                    .member(Member::field(
                        "age",
                        Accessors::scalar(|p: &Person| p.age, |p, v| p.age = v),
                    )),
            )
    }
}

#[test]
fn overriding_an_inherited_accessor_does_not_drop_new_fields() {
    let writer = OrmWriter::with_cache_size(8).generic_binding(false);
    let meta = writer.introspect::<Person>().unwrap();

    assert_eq!(
        access_of(&meta),
        vec![
            ("id", AccessType::Field),
            ("name", AccessType::Field),
            ("age", AccessType::Field),
        ]
    );
    assert!(meta.attribute("age").unwrap().info().is_insertable());

    let mut conn = RecordingConnection::new();
    let mut person = Person {
        name: "Ada".into(),
        age: 36,
        ..Person::default()
    };
    writer.insert(&mut conn, &mut person).unwrap();
    assert_eq!(conn.last_sql(), "INSERT INTO people(name,age) VALUES (?,?)");
    assert_eq!(person.id, 100);
}
