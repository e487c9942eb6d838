use quarry::common::Value;
use quarry::condition::{Comparison, ComparisonKind, ConditionBuilder, Operand};
use quarry::errors::{ErrorKind, QuarryResult};
use quarry::model::{Field, FieldKind, Model};
use quarry::query::{Query, QueryOptions};
use quarry_int_test::test_util::{people_model, sample_people};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn aged(model: &Model, kind: ComparisonKind, age: i64) -> QuarryResult<Query> {
    let tree = ConditionBuilder::new(model)
        .compare("age", kind, Operand::value(age))?
        .build();
    let mut query = Query::new(model.clone());
    query.update(QueryOptions::new().conditions(tree))?;
    Ok(query)
}

#[test]
fn test_union_matches_either_side() -> QuarryResult<()> {
    let model = people_model()?;
    let minors = aged(&model, ComparisonKind::LessThan, 18)?;
    let seniors = aged(&model, ComparisonKind::GreaterOrEqual, 65)?;

    let either = minors.union(&seniors)?;
    let matched = either.match_records(&sample_people())?;
    let names: Vec<Value> = matched.iter().map(|r| r.get("name")).collect();
    assert_eq!(names, vec![Value::from("Amy"), Value::from("Eve")]);
    Ok(())
}

#[test]
fn test_intersection_matches_both_sides() -> QuarryResult<()> {
    let model = people_model()?;
    let adults = aged(&model, ComparisonKind::GreaterOrEqual, 18)?;
    let working_age = aged(&model, ComparisonKind::LessThan, 65)?;

    let both = adults.intersection(&working_age)?;
    let matched = both.match_records(&sample_people())?;
    assert_eq!(matched.len(), 3);
    Ok(())
}

#[test]
fn test_difference_subtracts_the_right_side() -> QuarryResult<()> {
    let model = people_model()?;
    let adults = aged(&model, ComparisonKind::GreaterOrEqual, 18)?;
    let seniors = aged(&model, ComparisonKind::GreaterOrEqual, 65)?;

    let working = adults.difference(&seniors)?;
    let matched = working.match_records(&sample_people())?;
    let names: Vec<Value> = matched.iter().map(|r| r.get("name")).collect();
    assert_eq!(
        names,
        vec![Value::from("Sam"), Value::from("Dan"), Value::from("Bob")]
    );
    Ok(())
}

#[test]
fn test_identities_with_the_unconstrained_query() -> QuarryResult<()> {
    let model = people_model()?;
    let everything = Query::new(model.clone());
    let adults = aged(&model, ComparisonKind::GreaterOrEqual, 18)?;

    // union with everything is everything
    assert!(adults.union(&everything)?.conditions().is_none());

    // intersecting with everything keeps the other side
    let narrowed = everything.intersection(&adults)?;
    assert_eq!(narrowed.match_records(&sample_people())?.len(), 4);

    // subtracting everything leaves nothing
    let none = adults.difference(&everything)?;
    assert!(none.match_records(&sample_people())?.is_empty());
    Ok(())
}

#[test]
fn test_union_is_idempotent_over_records() -> QuarryResult<()> {
    let model = people_model()?;
    let adults = aged(&model, ComparisonKind::GreaterOrEqual, 18)?;
    let doubled = adults.union(&adults)?;
    assert_eq!(
        doubled.match_records(&sample_people())?,
        adults.match_records(&sample_people())?
    );
    Ok(())
}

#[test]
fn test_cross_model_algebra_is_rejected() -> QuarryResult<()> {
    let other = Model::builder("orders")
        .field(Field::new("id", FieldKind::Integer))
        .key(&["id"])
        .build()?;
    let err = Query::new(people_model()?)
        .union(&Query::new(other))
        .unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ModelMismatch);
    Ok(())
}

#[test]
fn test_paginated_side_becomes_key_membership() -> QuarryResult<()> {
    // a windowed query cannot donate its conditions directly; the window
    // would silently vanish. It has to survive as a subquery over the key.
    let model = people_model()?;
    let first_page = aged(&model, ComparisonKind::GreaterOrEqual, 18)?.slice(0, 2)?;
    let named = {
        let tree = ConditionBuilder::new(&model)
            .filter("name", Operand::value("Sam"))?
            .build();
        let mut query = Query::new(model.clone());
        query.update(QueryOptions::new().conditions(tree))?;
        query
    };

    let difference = first_page.difference(&named)?;
    let tree = difference.conditions().unwrap();

    let membership: Vec<&Comparison> = tree
        .comparisons()
        .filter(|c| c.subject().is_relationship())
        .collect();
    assert_eq!(membership.len(), 1);
    assert_eq!(membership[0].kind(), ComparisonKind::Inclusion);

    let rel = membership[0].subject().as_relationship().unwrap();
    assert_eq!(rel.name(), "self");
    assert_eq!(rel.source_key(), &["id"]);
    assert_eq!(rel.target_key(), &["id"]);

    match membership[0].value() {
        Operand::Query(inner) => {
            assert_eq!(inner.fields(), &["id"]);
            assert_eq!(inner.offset(), 0);
            assert_eq!(inner.limit(), Some(2));
        }
        other => panic!("expected a subquery operand, got {:?}", other),
    }

    // the negated side sits under a Not in the same And root
    let rendered = format!("{}", tree);
    assert!(rendered.contains("NOT(name = \"Sam\")"), "{}", rendered);
    Ok(())
}

#[test]
fn test_result_window_is_cleared() -> QuarryResult<()> {
    let model = people_model()?;
    let a = aged(&model, ComparisonKind::GreaterOrEqual, 18)?.slice(2, 5)?;
    let b = aged(&model, ComparisonKind::LessThan, 65)?;

    let union = a.union(&b)?;
    assert_eq!(union.offset(), 0);
    assert_eq!(union.limit(), None);
    assert!(union.links().is_empty());
    Ok(())
}
