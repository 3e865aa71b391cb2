use std::sync::Arc;

use chrono::Utc;
use commerce::{
    AccountService, CHECKOUT_SESSION_COMPLETED, CartService, CatalogService, FulfillmentPipeline,
    InMemoryNotifier, NewProduct, WebhookVerifier,
};
use common::{CartId, Money};
use criterion::{Criterion, criterion_group, criterion_main};
use store::InMemoryStore;

const SECRET: &str = "whsec_bench";

fn signed_payload(event_id: &str, cart_id: CartId) -> (Vec<u8>, String) {
    let body = serde_json::to_vec(&serde_json::json!({
        "id": event_id,
        "type": CHECKOUT_SESSION_COMPLETED,
        "data": { "object": { "id": "cs_bench", "metadata": { "cart_id": cart_id.to_string() } } }
    }))
    .unwrap();
    let header = WebhookVerifier::new(SECRET, 300)
        .sign(&body, Utc::now().timestamp())
        .unwrap();
    (body, header)
}

/// Registers a shopper with `lines` distinct products in their cart.
async fn seed_cart(store: &InMemoryStore, lines: usize) -> CartId {
    let accounts = AccountService::new(store.clone());
    let catalog = CatalogService::new(store.clone());
    let carts = CartService::new(store.clone());

    let shopper = accounts
        .register(&format!("bench{}", uuid::Uuid::new_v4().simple()), "bench@example.com")
        .await
        .unwrap()
        .user
        .id;
    for i in 0..lines {
        let product = catalog
            .create_product(
                shopper,
                NewProduct {
                    name: format!("Product {i}"),
                    description: String::new(),
                    price: Money::from_cents(1000 + i as i64),
                    stock: 1_000,
                },
            )
            .await
            .unwrap();
        carts.add_item(shopper, product.id, 2).await.unwrap();
    }
    carts.get_or_create_cart(shopper).await.unwrap().id
}

fn pipeline(store: &InMemoryStore) -> FulfillmentPipeline<InMemoryStore> {
    FulfillmentPipeline::new(
        store.clone(),
        WebhookVerifier::new(SECRET, 300),
        Arc::new(InMemoryNotifier::new()),
    )
}

fn bench_verify_signature(c: &mut Criterion) {
    let verifier = WebhookVerifier::new(SECRET, 300);
    let (body, header) = signed_payload("evt_bench", CartId::new());

    c.bench_function("fulfillment/verify_signature", |b| {
        b.iter(|| verifier.construct_event(&body, &header).unwrap());
    });
}

fn bench_fulfill_cart(c: &mut Criterion, lines: usize) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function(&format!("fulfillment/fulfill_cart_{lines}_lines"), |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryStore::new();
                let cart_id = seed_cart(&store, lines).await;
                let (body, header) = signed_payload("evt_bench", cart_id);
                pipeline(&store).handle(&body, &header).await.unwrap();
            });
        });
    });
}

fn bench_fulfill_small_cart(c: &mut Criterion) {
    bench_fulfill_cart(c, 3);
}

fn bench_fulfill_large_cart(c: &mut Criterion) {
    bench_fulfill_cart(c, 50);
}

fn bench_duplicate_delivery(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let pipeline = pipeline(&store);
    let (body, header) = rt.block_on(async {
        let cart_id = seed_cart(&store, 3).await;
        let (body, header) = signed_payload("evt_dup", cart_id);
        pipeline.handle(&body, &header).await.unwrap();
        (body, header)
    });

    c.bench_function("fulfillment/duplicate_delivery", |b| {
        b.iter(|| {
            rt.block_on(async {
                pipeline.handle(&body, &header).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_verify_signature,
    bench_fulfill_small_cart,
    bench_fulfill_large_cart,
    bench_duplicate_delivery,
);
criterion_main!(benches);
