use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use memq_broker::{
    Broker, Message, PartitionStrategy, TcpClient, TcpClientOptions, TcpServer, TcpServerOptions,
    TopicDefinition,
};
use tokio::runtime::Runtime;

fn broker(strategy: PartitionStrategy) -> Broker {
    Broker::new(vec![TopicDefinition::new("bench", 8).with_strategy(strategy)]).unwrap()
}

fn publish_individual(broker: &Broker, count: usize) {
    for i in 0..count {
        broker.publish("bench", vec![Message::new(format!("key-{}", i % 64), i.to_string())]).unwrap();
    }
}

fn publish_batch(broker: &Broker, count: usize) {
    broker
        .publish("bench", (0..count).map(|i| Message::new(format!("key-{}", i % 64), i.to_string())))
        .unwrap();
}

fn consume(broker: &Broker, count: usize, batch: usize) {
    publish_batch(broker, count);
    let sub = broker.subscribe("bench", "bench-group").unwrap();
    loop {
        let polled = broker.poll(&sub, batch).unwrap();
        if polled.is_empty() {
            break;
        }
        broker.move_offset(&sub, polled.len()).unwrap();
    }
}

fn bench_publish(c: &mut Criterion) {
    let count = 1000;
    let mut group = c.benchmark_group("Publish");

    for strategy in [PartitionStrategy::Hash, PartitionStrategy::RoundRobin] {
        group.bench_function(BenchmarkId::new(format!("Individual/{}", strategy), count), |b| {
            b.iter_batched(|| broker(strategy), |broker| publish_individual(&broker, count), criterion::BatchSize::SmallInput)
        });
        group.bench_function(BenchmarkId::new(format!("Batch/{}", strategy), count), |b| {
            b.iter_batched(|| broker(strategy), |broker| publish_batch(&broker, count), criterion::BatchSize::SmallInput)
        });
    }

    group.finish();
}

fn bench_consume(c: &mut Criterion) {
    let count = 1000;
    let mut group = c.benchmark_group("Consume");

    for batch in [1, 32, 256] {
        group.bench_function(BenchmarkId::new("PollCommit", batch), |b| {
            b.iter_batched(
                || broker(PartitionStrategy::Hash),
                |broker| consume(&broker, count, batch),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_tcp(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let count = 100;

    let addr = rt.block_on(async {
        let server = TcpServer::new(
            Arc::new(broker(PartitionStrategy::RoundRobin)),
            TcpServerOptions { listen_addr: "127.0.0.1:0".parse().unwrap() },
        );
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });
        addr
    });

    let mut group = c.benchmark_group("Tcp");
    group.bench_function(BenchmarkId::new("PublishPoll", count), |b| {
        b.to_async(&rt).iter(|| async {
            let mut client = TcpClient::new(TcpClientOptions { server_addr: addr });
            client.connect().await.unwrap();
            let messages: Vec<Message> = (0..count).map(|i| Message::unkeyed(i.to_string())).collect();
            client.publish("bench", &messages).await.unwrap();
            let sub = client.subscribe("bench", "tcp-group").await.unwrap();
            let polled = client.poll(&sub, count).await.unwrap();
            client.move_offset(&sub, polled.len()).await.unwrap();
            client.disconnect().await.unwrap();
        })
    });
    group.finish();
}

criterion_group!(benches, bench_publish, bench_consume, bench_tcp);
criterion_main!(benches);
