use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hornero_core::entities::Supplier;
use hornero_core::prelude::*;

fn bench_scoped_select(c: &mut Criterion) {
    let ctx = RequestContext::for_tenant(TenantId::new(3), ResolutionSource::AuthenticatedUser);

    c.bench_function("scoped_select_to_sql", |b| {
        b.iter(|| {
            let statement = ScopedQueryBuilder::new(&ctx)
                .select::<Supplier>(
                    Filter::new()
                        .eq("activo", true)
                        .eq("nombre", black_box("Molinos del Sur")),
                )
                .unwrap();
            black_box(statement.to_sql())
        });
    });
}

fn bench_scoped_update(c: &mut Criterion) {
    let ctx = RequestContext::for_tenant(TenantId::new(3), ResolutionSource::AuthenticatedUser);

    c.bench_function("scoped_update_to_sql", |b| {
        b.iter(|| {
            let statement = ScopedQueryBuilder::new(&ctx)
                .update::<Supplier>(
                    Filter::new().eq("id", black_box(42_i64)),
                    Assignments::new().set("telefono", "555-0101"),
                )
                .unwrap();
            black_box(statement.to_sql())
        });
    });
}

criterion_group!(benches, bench_scoped_select, bench_scoped_update);
criterion_main!(benches);
