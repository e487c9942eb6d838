use quarry::common::{Record, SortOrder};
use quarry::condition::{ComparisonKind, ConditionBuilder, Operand};
use quarry::errors::QuarryResult;
use quarry::query::{Query, QueryOptions};
use quarry::record;
use quarry_int_test::test_util::people_model;

fn main() -> QuarryResult<()> {
    println!("Starting query stress run...");
    let model = people_model()?;

    let count = 1_000_000;
    let start = std::time::Instant::now();
    let records: Vec<Record> = (0..count)
        .map(|i| {
            record! {
                "id" => i,
                "name" => format!("person-{}", i % 1000),
                "age" => i % 100,
                "active" => i % 3 != 0
            }
        })
        .collect();
    println!("Built {} records in {:?}", count, start.elapsed());

    let adults = ConditionBuilder::new(&model)
        .compare("age", ComparisonKind::GreaterOrEqual, Operand::value(18))?
        .filter("active", Operand::value(true))?
        .build();
    let mut query = Query::new(model.clone());
    query.update(
        QueryOptions::new()
            .conditions(adults)
            .order_by("age", SortOrder::Descending)
            .limit(100),
    )?;

    let start = std::time::Instant::now();
    let matched = query.match_records(&records)?;
    println!(
        "Matched {} of {} records in {:?}",
        matched.len(),
        count,
        start.elapsed()
    );

    let seniors = {
        let tree = ConditionBuilder::new(&model)
            .compare("age", ComparisonKind::GreaterOrEqual, Operand::value(65))?
            .build();
        let mut q = Query::new(model.clone());
        q.update(QueryOptions::new().conditions(tree))?;
        q
    };

    let start = std::time::Instant::now();
    let difference = query.difference(&seniors)?;
    let remaining = difference.filter_records(&records)?;
    println!(
        "Difference kept {} records in {:?}",
        remaining.len(),
        start.elapsed()
    );

    Ok(())
}
