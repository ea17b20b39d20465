use common::{Money, OrderStatus, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CartService, OrderService, StockPolicy};
use store::{InMemoryStore, NewProduct, NewShippingDetails, StorefrontStore};

fn address(user_id: UserId) -> NewShippingDetails {
    NewShippingDetails {
        user_id,
        street: "1 Bench Way".to_string(),
        city: "Perf".to_string(),
        state: "CA".to_string(),
        pincode: "94000".to_string(),
        country: "US".to_string(),
        phone: "5550000".to_string(),
    }
}

fn bench_add_item(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let carts = CartService::new(store.clone());
    let user_id = UserId::new();
    let product = rt.block_on(async {
        store
            .insert_product(NewProduct::new("Widget", Money::from_cents(1_000), 1_000))
            .await
            .unwrap()
    });

    c.bench_function("cart/add_item", |b| {
        b.iter(|| {
            rt.block_on(async {
                carts.add_item(user_id, product.id, 3).await.unwrap();
            });
        });
    });
}

fn bench_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("order/add_place_confirm", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryStore::new();
                let carts = CartService::new(store.clone());
                let orders = OrderService::new(store.clone(), StockPolicy::OnPlacement);
                let user_id = UserId::new();
                let shipping = store.insert_shipping_details(address(user_id)).await.unwrap();

                for i in 0..5 {
                    let product = store
                        .insert_product(NewProduct::new(
                            format!("Item {i}"),
                            Money::from_cents(500 + i),
                            10,
                        ))
                        .await
                        .unwrap();
                    carts.add_item(user_id, product.id, 2).await.unwrap();
                }

                let order = orders.place_order(user_id, Some(shipping.id)).await.unwrap();
                orders
                    .change_status(order.id, OrderStatus::Confirmed)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_add_item, bench_checkout);
criterion_main!(benches);
