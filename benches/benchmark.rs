use criterion::{criterion_group, criterion_main, Criterion};
use ip_rib::*;
use rand::prelude::*;

fn random_prefixes(n: usize) -> Vec<String> {
    let mut rng = thread_rng();
    (0..n)
        .map(|_| {
            let len = rng.gen_range(1..=24u8);
            let addr: u32 = rng.gen::<u32>() & !(u32::MAX >> len);
            format!("{}/{}", std::net::Ipv4Addr::from(addr), len)
        })
        .collect()
}

fn do_inserts<T: RoutingTable>(prefixes: &[String]) -> T {
    let mut rib = T::new(Family::Ipv4);
    for prefix in prefixes {
        rib.add(prefix, attrs! { via = "10.0.0.1" }).unwrap();
    }
    rib
}

fn do_lookups<T: RoutingTable>(rib: &T, prefixes: &[String]) {
    for prefix in prefixes {
        let _ = rib.get(prefix, &Attrs::new()).unwrap();
    }
}

pub fn inserts(c: &mut Criterion) {
    let prefixes = random_prefixes(1_000);
    c.bench_function("prefix tree inserts", |b| {
        b.iter(|| do_inserts::<IpPrefixTree>(&prefixes))
    });
    c.bench_function("radix tree inserts", |b| {
        b.iter(|| do_inserts::<IpRadixTree>(&prefixes))
    });
}

pub fn lookups(c: &mut Criterion) {
    let prefixes = random_prefixes(1_000);
    let bit_tree: IpPrefixTree = do_inserts(&prefixes);
    let radix: IpRadixTree = do_inserts(&prefixes);
    c.bench_function("prefix tree lookups", |b| b.iter(|| do_lookups(&bit_tree, &prefixes)));
    c.bench_function("radix tree lookups", |b| b.iter(|| do_lookups(&radix, &prefixes)));
}

criterion_group!(benches, inserts, lookups);
criterion_main!(benches);
