use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgdat::{Builder, SelectBuilder, Value, expr, insert_into, interpolate, select, select_doc};

/// SELECT col0, col1, ... FROM t WHERE (col0 = $1) AND (col1 = $1) ...
fn build_select(n: usize) -> SelectBuilder {
    let cols: Vec<String> = (0..n).map(|i| format!("col{i}")).collect();
    let mut b = select(cols).from("t");
    for i in 0..n {
        b = b.where_sql(format!("col{i} = $1"), (i as i64,));
    }
    b
}

fn bench_to_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/to_sql");

    for n in [1, 5, 10, 50, 100] {
        let b = build_select(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &b, |bench, b| {
            bench.iter(|| black_box(b.to_sql().unwrap()));
        });
    }

    group.finish();
}

fn bench_build_and_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/build_and_render");

    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bench, &n| {
            bench.iter(|| black_box(build_select(n).to_sql().unwrap()));
        });
    }

    group.finish();
}

fn bench_insert_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/insert_rows");

    for n in [1, 10, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bench, &n| {
            bench.iter(|| {
                let mut b = insert_into("t").columns(["a", "b", "c"]);
                for i in 0..n {
                    b = b.values((i as i64, "text", true));
                }
                black_box(b.to_sql().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_interpolate(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/interpolate");

    for n in [1, 10, 100] {
        let sql: String = (1..=n)
            .map(|i| format!("c{i} = ${i}"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!("SELECT * FROM t WHERE {sql}");
        let args: Vec<Value> = (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Value::from(i as i64)
                } else {
                    Value::from("it's quoted")
                }
            })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &(sql, args), |bench, (sql, args)| {
            bench.iter(|| black_box(interpolate(sql, args).unwrap()));
        });
    }

    group.finish();
}

fn bench_select_doc(c: &mut Criterion) {
    c.bench_function("sql_builder/select_doc_nested", |bench| {
        bench.iter(|| {
            let posts = select_doc(["id", "title"])
                .from("posts")
                .where_sql("user_id = $1", (7,))
                .many("tags", expr("SELECT name FROM tags WHERE post_id = $1", (1,)));
            let b = select_doc(["id", "name"])
                .from("users")
                .many("posts", posts)
                .where_sql("id = $1", (7,));
            black_box(b.to_sql().unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_to_sql,
    bench_build_and_render,
    bench_insert_rows,
    bench_interpolate,
    bench_select_doc
);
criterion_main!(benches);
