use quarry::common::Record;
use quarry::errors::QuarryResult;
use quarry::model::{Field, FieldKind, Model};
use quarry::record;

/// The model shared by most integration scenarios.
pub fn people_model() -> QuarryResult<Model> {
    Model::builder("people")
        .field(Field::new("id", FieldKind::Integer).required())
        .field(Field::new("name", FieldKind::Text))
        .field(Field::new("age", FieldKind::Integer))
        .field(Field::new("active", FieldKind::Boolean))
        .key(&["id"])
        .build()
}

/// A people model wired to an orders model through a one-to-many
/// relationship named "orders" (inverse "person").
pub fn people_with_orders() -> QuarryResult<(Model, Model)> {
    let people = people_model()?;
    let orders = Model::builder("orders")
        .field(Field::new("id", FieldKind::Integer).required())
        .field(Field::new("person_id", FieldKind::Integer))
        .field(Field::new("total", FieldKind::Float))
        .key(&["id"])
        .build()?;
    people.has_many("orders", &orders, &["id"], &["person_id"], "person")?;
    Ok((people, orders))
}

pub fn sample_people() -> Vec<Record> {
    vec![
        record! { "id" => 1, "name" => "Sam", "age" => 30, "active" => true },
        record! { "id" => 2, "name" => "Dan", "age" => 25, "active" => true },
        record! { "id" => 3, "name" => "Amy", "age" => 17, "active" => false },
        record! { "id" => 4, "name" => "Bob", "age" => 40, "active" => true },
        record! { "id" => 5, "name" => "Eve", "age" => 65, "active" => false },
    ]
}
