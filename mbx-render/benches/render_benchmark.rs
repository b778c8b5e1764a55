use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mbx_core::{ColorScheme, Complex, RenderRequest, Size};
use mbx_render::{Frame, RenderServer};

criterion_main!(benches);
criterion_group!(benches, bench_multithread, bench_refine);

fn base_request(iterations: u32) -> RenderRequest {
    RenderRequest {
        size: Size {
            width: 512,
            height: 512,
        },
        center: Complex::new(-0.5, 0.0),
        zoom: 3.0,
        max_iterations: iterations,
        scheme: ColorScheme::DiscreteBands,
        ..Default::default()
    }
}

/// Full renders of the base window, across threads.
pub fn bench_multithread(c: &mut Criterion) {
    let mut group = c.benchmark_group("multithreading-base");

    let req = base_request(256);
    // Count pixels:
    group.throughput(criterion::Throughput::Elements(
        req.size.width as u64 * req.size.height as u64,
    ));
    // Don't spend too long preparing:
    group.warm_up_time(Duration::from_secs(1));

    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    // Count up powers of two:
    let thread_range = (0..).map(|x| 1 << x).take_while({
        let x = num_cpus::get().next_power_of_two();
        move |y| (*y <= x)
    });
    for threads in thread_range {
        let exec = RenderServer::with_threads(threads).unwrap();

        group.bench_with_input(BenchmarkId::new("full", threads), &req, |b, input| {
            b.to_async(&rt)
                .iter_with_large_drop(|| exec.render(black_box(input.clone()), None))
        });
    }

    group.finish();
}

/// Progressive renders: how much the neighbour skip saves over a full render.
pub fn bench_refine(c: &mut Criterion) {
    let mut group = c.benchmark_group("refine");
    group.warm_up_time(Duration::from_secs(1));

    let exec = RenderServer::with_threads(num_cpus::get()).unwrap();
    for iterations in [256, 1024] {
        let req = base_request(iterations);
        group.bench_with_input(
            BenchmarkId::new("progressive", iterations),
            &req,
            |b, input| {
                b.iter(|| {
                    exec.refine(black_box(input.clone()))
                        .filter_map(Result::ok)
                        .find_map(|frame| match frame {
                            Frame::Finished(image) => Some(image),
                            Frame::Step { .. } => None,
                        })
                })
            },
        );
    }

    group.finish();
}
