mod common;

use std::str::FromStr;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{Value, json};
use storefront_api::{
    dto::{
        cart::{AddCartItemRequest, UpdateCartItemRequest},
        collections::CollectionRequest,
        customers::{PatchCustomerRequest, UpdateCustomerRequest},
        orders::{CreateOrderRequest, UpdateOrderRequest},
        products::{CreateProductRequest, UpdateProductRequest},
        reviews::{PatchReviewRequest, ReviewRequest},
    },
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::Entity as Carts,
        customers::{Column as CustomerCol, Entity as Customers, Membership},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::PaymentStatus,
    },
    error::AppError,
    middleware::auth::AuthUser,
    routes::{
        create_app,
        params::{OrderListQuery, Pagination},
    },
    services::{
        cart_service, collection_service, customer_service, order_service, product_service,
        review_service,
    },
    state::AppState,
};
use uuid::Uuid;

async fn seed_product(
    state: &AppState,
    admin: &AuthUser,
    title: &str,
    unit_price: rust_decimal::Decimal,
) -> anyhow::Result<(i32, i32)> {
    let collection = collection_service::create_collection(
        state,
        admin,
        CollectionRequest {
            title: format!("Collection for {title}"),
        },
    )
    .await?
    .data
    .expect("collection");

    let product = product_service::create_product(
        state,
        admin,
        CreateProductRequest {
            title: title.to_string(),
            slug: None,
            description: Some("for testing".into()),
            unit_price,
            inventory: 10,
            collection: collection.id,
        },
    )
    .await?
    .data
    .expect("product");

    Ok((collection.id, product.id))
}

// Adding the same product twice merges into a single line; a different product gets its own line.
#[tokio::test]
async fn cart_add_merges_quantities() -> anyhow::Result<()> {
    let Some(state) = common::db_state().await? else {
        return Ok(());
    };
    let (_, admin) = common::create_user(&state, true, true).await?;
    let (_, mug) = seed_product(&state, &admin, "Merge Mug", dec!(12.50)).await?;
    let (_, cap) = seed_product(&state, &admin, "Merge Cap", dec!(8.00)).await?;

    let cart = cart_service::create_cart(&state).await?.data.expect("cart");

    let first = cart_service::add_cart_item(
        &state,
        cart.id,
        AddCartItemRequest {
            product_id: mug,
            quantity: 2,
        },
    )
    .await?
    .data
    .expect("item");
    let second = cart_service::add_cart_item(
        &state,
        cart.id,
        AddCartItemRequest {
            product_id: mug,
            quantity: 3,
        },
    )
    .await?
    .data
    .expect("item");
    assert_eq!(first.id, second.id);
    assert_eq!(second.quantity, 5);

    cart_service::add_cart_item(
        &state,
        cart.id,
        AddCartItemRequest {
            product_id: cap,
            quantity: 1,
        },
    )
    .await?;

    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .count(&state.orm)
        .await?;
    assert_eq!(lines, 2);

    let view = cart_service::get_cart(&state, cart.id).await?.data.expect("cart");
    assert_eq!(view.total_price, dec!(70.50));

    let updated = cart_service::update_item(
        &state,
        cart.id,
        first.id,
        UpdateCartItemRequest { quantity: 1 },
    )
    .await?
    .data
    .expect("item");
    assert_eq!(updated.total_price, dec!(12.50));

    let missing = cart_service::add_cart_item(
        &state,
        cart.id,
        AddCartItemRequest {
            product_id: i32::MAX,
            quantity: 1,
        },
    )
    .await;
    assert!(matches!(missing, Err(AppError::BadRequest(_))));

    let unknown_cart = cart_service::get_cart(&state, Uuid::new_v4()).await;
    assert!(matches!(unknown_cart, Err(AppError::NotFound)));

    cart_service::delete_cart(&state, cart.id).await?;
    let orphaned = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .count(&state.orm)
        .await?;
    assert_eq!(orphaned, 0);

    Ok(())
}

// Placing an order snapshots prices, removes the cart and blocks deletion of the products.
#[tokio::test]
async fn order_placement_snapshots_cart() -> anyhow::Result<()> {
    let Some(state) = common::db_state().await? else {
        return Ok(());
    };
    let (_, admin) = common::create_user(&state, true, true).await?;
    let (_, buyer) = common::create_user(&state, false, false).await?;
    let (collection_id, product_id) = seed_product(&state, &admin, "Order Widget", dec!(20.00)).await?;

    let cart = cart_service::create_cart(&state).await?.data.expect("cart");
    cart_service::add_cart_item(
        &state,
        cart.id,
        AddCartItemRequest {
            product_id,
            quantity: 3,
        },
    )
    .await?;

    let order = order_service::create_order(&state, &buyer, CreateOrderRequest { cart_id: cart.id })
        .await?
        .data
        .expect("order");
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.customer.user_id, buyer.user_id);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 3);
    assert_eq!(order.items[0].unit_price, dec!(20.00));

    assert!(Carts::find_by_id(cart.id).one(&state.orm).await?.is_none());

    // Later price changes do not touch the order snapshot.
    product_service::update_product(
        &state,
        &admin,
        product_id,
        UpdateProductRequest {
            title: None,
            slug: None,
            description: None,
            unit_price: Some(dec!(25.00)),
            inventory: None,
            collection: None,
        },
    )
    .await?;
    let reloaded = order_service::get_order(&state, &buyer, order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(reloaded.items[0].unit_price, dec!(20.00));

    let blocked = product_service::delete_product(&state, &admin, product_id).await;
    assert!(matches!(blocked, Err(AppError::MethodNotAllowed(_))));
    let blocked = collection_service::delete_collection(&state, &admin, collection_id).await;
    assert!(matches!(blocked, Err(AppError::MethodNotAllowed(_))));
    let blocked = order_service::delete_order(&state, &admin, order.id).await;
    assert!(matches!(blocked, Err(AppError::MethodNotAllowed(_))));

    // The cart is gone, so a second attempt is rejected.
    let again = order_service::create_order(&state, &buyer, CreateOrderRequest { cart_id: cart.id }).await;
    assert!(matches!(again, Err(AppError::BadRequest(_))));

    Ok(())
}

#[tokio::test]
async fn empty_cart_creates_nothing() -> anyhow::Result<()> {
    let Some(state) = common::db_state().await? else {
        return Ok(());
    };
    let (_, buyer) = common::create_user(&state, false, false).await?;

    let cart = cart_service::create_cart(&state).await?.data.expect("cart");
    let result = order_service::create_order(&state, &buyer, CreateOrderRequest { cart_id: cart.id }).await;
    match result {
        Err(AppError::BadRequest(reason)) => assert_eq!(reason, "Cart with given id is empty"),
        other => panic!("expected empty cart rejection, got {other:?}"),
    }

    assert!(Carts::find_by_id(cart.id).one(&state.orm).await?.is_some());
    // Nothing is written for a rejected order, not even a customer profile.
    let profiles = Customers::find()
        .filter(CustomerCol::UserId.eq(buyer.user_id))
        .count(&state.orm)
        .await?;
    assert_eq!(profiles, 0);
    Ok(())
}

// Users only see their own orders; staff see everyone's; cancelling needs the permission.
#[tokio::test]
async fn order_visibility_and_cancellation() -> anyhow::Result<()> {
    let Some(state) = common::db_state().await? else {
        return Ok(());
    };
    let (_, admin) = common::create_user(&state, true, true).await?;
    let (_, alice) = common::create_user(&state, false, true).await?;
    let (_, bob) = common::create_user(&state, false, false).await?;
    let (_, product_id) = seed_product(&state, &admin, "Visible Thing", dec!(5.00)).await?;

    let mut placed = Vec::new();
    for buyer in [&alice, &bob] {
        let cart = cart_service::create_cart(&state).await?.data.expect("cart");
        cart_service::add_cart_item(
            &state,
            cart.id,
            AddCartItemRequest {
                product_id,
                quantity: 1,
            },
        )
        .await?;
        let order = order_service::create_order(&state, buyer, CreateOrderRequest { cart_id: cart.id })
            .await?
            .data
            .expect("order");
        placed.push(order.id);
    }
    let (alice_order, bob_order) = (placed[0], placed[1]);

    let query = || OrderListQuery {
        per_page: Some(100),
        ..Default::default()
    };
    let alice_orders = order_service::list_orders(&state, &alice, query()).await?.data.expect("orders");
    assert!(alice_orders.items.iter().all(|o| o.id != bob_order));
    assert!(alice_orders.items.iter().any(|o| o.id == alice_order));

    let hidden = order_service::get_order(&state, &alice, bob_order).await;
    assert!(matches!(hidden, Err(AppError::NotFound)));

    let admin_view = order_service::get_order(&state, &admin, bob_order).await?;
    assert_eq!(admin_view.data.expect("order").id, bob_order);

    let denied = order_service::cancel_order(&state, &bob, bob_order).await;
    assert!(matches!(denied, Err(AppError::Forbidden)));

    let cancelled = order_service::cancel_order(&state, &alice, alice_order)
        .await?
        .data
        .expect("order");
    assert_eq!(cancelled.payment_status, PaymentStatus::Failed);

    let twice = order_service::cancel_order(&state, &alice, alice_order).await;
    assert!(matches!(twice, Err(AppError::BadRequest(_))));

    let completed = order_service::update_order(
        &state,
        &admin,
        bob_order,
        UpdateOrderRequest {
            payment_status: PaymentStatus::Complete,
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(completed.payment_status, PaymentStatus::Complete);

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(bob_order))
        .count(&state.orm)
        .await?;
    assert_eq!(items, 1);
    Ok(())
}

#[tokio::test]
async fn reviews_are_scoped_to_their_product() -> anyhow::Result<()> {
    let Some(state) = common::db_state().await? else {
        return Ok(());
    };
    let (_, admin) = common::create_user(&state, true, true).await?;
    let (_, reviewed) = seed_product(&state, &admin, "Reviewed Kettle", dec!(30.00)).await?;
    let (_, other) = seed_product(&state, &admin, "Other Kettle", dec!(31.00)).await?;

    let review = review_service::create_review(
        &state,
        reviewed,
        ReviewRequest {
            name: "Sam".into(),
            description: "Boils fast".into(),
        },
    )
    .await?
    .data
    .expect("review");

    let listed = review_service::list_reviews(&state, reviewed, Pagination::default())
        .await?
        .data
        .expect("reviews");
    assert_eq!(listed.items.len(), 1);

    let wrong_product = review_service::get_review(&state, other, review.id).await;
    assert!(matches!(wrong_product, Err(AppError::NotFound)));

    // Deleting the product takes its reviews with it.
    product_service::delete_product(&state, &admin, reviewed).await?;
    let gone = review_service::get_review(&state, reviewed, review.id).await;
    assert!(matches!(gone, Err(AppError::NotFound)));
    Ok(())
}

// Two first visits from the same user must share one profile.
#[tokio::test]
async fn concurrent_first_visits_share_one_customer() -> anyhow::Result<()> {
    let Some(state) = common::db_state().await? else {
        return Ok(());
    };

    for _ in 0..10 {
        let (_, user) = common::create_user(&state, false, false).await?;
        let (left, right) = tokio::join!(
            customer_service::get_me(&state, &user),
            customer_service::get_me(&state, &user),
        );
        let left = left?.data.expect("customer");
        let right = right?.data.expect("customer");
        assert_eq!(left.id, right.id);

        let profiles = Customers::find()
            .filter(CustomerCol::UserId.eq(user.user_id))
            .count(&state.orm)
            .await?;
        assert_eq!(profiles, 1);
    }
    Ok(())
}

#[tokio::test]
async fn concurrent_first_adds_merge_into_one_line() -> anyhow::Result<()> {
    let Some(state) = common::db_state().await? else {
        return Ok(());
    };
    let (_, admin) = common::create_user(&state, true, true).await?;
    let (_, product_id) = seed_product(&state, &admin, "Race Tea", dec!(4.00)).await?;

    for _ in 0..10 {
        let cart = cart_service::create_cart(&state).await?.data.expect("cart");
        let (left, right) = tokio::join!(
            cart_service::add_cart_item(
                &state,
                cart.id,
                AddCartItemRequest {
                    product_id,
                    quantity: 2,
                },
            ),
            cart_service::add_cart_item(
                &state,
                cart.id,
                AddCartItemRequest {
                    product_id,
                    quantity: 3,
                },
            ),
        );
        let left = left?.data.expect("item");
        let right = right?.data.expect("item");
        assert_eq!(left.id, right.id);
        assert_eq!(left.quantity.max(right.quantity), 5);

        let lines = CartItems::find()
            .filter(CartItemCol::CartId.eq(cart.id))
            .all(&state.orm)
            .await?;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 5);
    }
    Ok(())
}

#[tokio::test]
async fn patch_only_touches_sent_fields() -> anyhow::Result<()> {
    let Some(state) = common::db_state().await? else {
        return Ok(());
    };
    let (_, admin) = common::create_user(&state, true, true).await?;
    let (_, member) = common::create_user(&state, false, false).await?;
    let birth_date = chrono::NaiveDate::from_ymd_opt(1990, 4, 1);

    let customer = customer_service::get_me(&state, &member).await?.data.expect("customer");
    customer_service::update_customer(
        &state,
        &admin,
        customer.id,
        UpdateCustomerRequest {
            membership: Membership::Gold,
            phone: "555-0100".into(),
            birth_date,
        },
    )
    .await?;

    let patched = customer_service::patch_customer(
        &state,
        &admin,
        customer.id,
        PatchCustomerRequest {
            phone: Some("555-9999".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("customer");
    assert_eq!(patched.membership, Membership::Gold);
    assert_eq!(patched.phone, "555-9999");
    assert_eq!(patched.birth_date, birth_date);

    let cleared = customer_service::patch_customer(
        &state,
        &admin,
        customer.id,
        PatchCustomerRequest {
            birth_date: Some(None),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("customer");
    assert_eq!(cleared.membership, Membership::Gold);
    assert_eq!(cleared.birth_date, None);

    let (_, product_id) = seed_product(&state, &admin, "Patched Pan", dec!(18.00)).await?;
    let review = review_service::create_review(
        &state,
        product_id,
        ReviewRequest {
            name: "Ana".into(),
            description: "Heats evenly".into(),
        },
    )
    .await?
    .data
    .expect("review");
    let review = review_service::patch_review(
        &state,
        product_id,
        review.id,
        PatchReviewRequest {
            description: Some("Heats evenly, easy to clean".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("review");
    assert_eq!(review.name, "Ana");
    assert_eq!(review.description, "Heats evenly, easy to clean");
    Ok(())
}

// A failure while writing order lines must undo the order and the profile created with it.
#[tokio::test]
async fn failed_order_lines_roll_back_everything() -> anyhow::Result<()> {
    let Some(state) = common::db_state().await? else {
        return Ok(());
    };
    let (_, admin) = common::create_user(&state, true, true).await?;
    let (_, buyer) = common::create_user(&state, false, false).await?;
    let (_, product_id) = seed_product(&state, &admin, "Rejected Lamp", dec!(40.00)).await?;

    let cart = cart_service::create_cart(&state).await?.data.expect("cart");
    cart_service::add_cart_item(
        &state,
        cart.id,
        AddCartItemRequest {
            product_id,
            quantity: 1,
        },
    )
    .await?;

    // Postgres trigger that refuses order lines for this one product.
    let guard = format!("reject_order_line_{product_id}");
    state
        .orm
        .execute_unprepared(&format!(
            "CREATE FUNCTION {guard}() RETURNS trigger AS $$ BEGIN \
             IF NEW.product_id = {product_id} THEN RAISE EXCEPTION 'order line rejected'; END IF; \
             RETURN NEW; END $$ LANGUAGE plpgsql"
        ))
        .await?;
    state
        .orm
        .execute_unprepared(&format!(
            "CREATE TRIGGER {guard} BEFORE INSERT ON order_items \
             FOR EACH ROW EXECUTE FUNCTION {guard}()"
        ))
        .await?;

    let result =
        order_service::create_order(&state, &buyer, CreateOrderRequest { cart_id: cart.id }).await;

    state
        .orm
        .execute_unprepared(&format!("DROP TRIGGER {guard} ON order_items"))
        .await?;
    state
        .orm
        .execute_unprepared(&format!("DROP FUNCTION {guard}()"))
        .await?;

    assert!(matches!(result, Err(AppError::OrmError(_))));

    // Orders need a customer, so no profile also means no order row survived.
    let profiles = Customers::find()
        .filter(CustomerCol::UserId.eq(buyer.user_id))
        .count(&state.orm)
        .await?;
    assert_eq!(profiles, 0);

    assert!(Carts::find_by_id(cart.id).one(&state.orm).await?.is_some());
    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .count(&state.orm)
        .await?;
    assert_eq!(lines, 1);
    Ok(())
}

fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .and_then(|raw| Decimal::from_str(raw).ok())
        .expect("decimal string")
}

fn id_of(body: &Value) -> i64 {
    body["data"]["id"].as_i64().expect("id")
}

// Whole shopping sequence over HTTP: catalog, review, cart, order, customer profile.
#[tokio::test]
async fn shopping_flow_over_http() -> anyhow::Result<()> {
    let Some(state) = common::db_state().await? else {
        return Ok(());
    };
    let app = || create_app(state.clone());
    let (admin_model, _) = common::create_user(&state, true, true).await?;
    let (buyer_model, _) = common::create_user(&state, false, false).await?;
    let (stranger_model, _) = common::create_user(&state, false, false).await?;
    let admin = common::bearer(&admin_model);
    let buyer = common::bearer(&buyer_model);
    let stranger = common::bearer(&stranger_model);

    let (status, body) = common::send(
        app(),
        "POST",
        "/api/collections",
        Some(&admin),
        Some(json!({ "title": "Http Kitchen" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let collection_id = id_of(&body);

    let (status, body) = common::send(
        app(),
        "POST",
        "/api/products",
        Some(&admin),
        Some(json!({
            "title": "Http Kettle",
            "unit_price": "15.00",
            "inventory": 5,
            "collection": collection_id
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["slug"], "http-kettle");
    assert_eq!(decimal(&body["data"]["price_with_tax"]), dec!(24.00));
    let product_id = id_of(&body);

    let reviews_uri = format!("/api/products/{product_id}/reviews");
    let (status, body) = common::send(
        app(),
        "POST",
        &reviews_uri,
        None,
        Some(json!({ "name": "Kim", "description": "Quick boil" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let review_uri = format!("{reviews_uri}/{}", id_of(&body));

    let (status, body) = common::send(
        app(),
        "PATCH",
        &review_uri,
        None,
        Some(json!({ "description": "Quick boil, quiet" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Kim");
    assert_eq!(body["data"]["description"], "Quick boil, quiet");

    let (status, body) = common::send(app(), "POST", "/api/carts", None, None).await;
    assert_eq!(status, StatusCode::CREATED);
    let cart_id = body["data"]["id"].as_str().expect("cart id").to_string();
    let cart_uri = format!("/api/carts/{cart_id}");
    let items_uri = format!("{cart_uri}/items");

    let (status, body) = common::send(
        app(),
        "POST",
        &items_uri,
        None,
        Some(json!({ "product_id": product_id, "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let item_id = id_of(&body);

    let (status, body) = common::send(
        app(),
        "POST",
        &items_uri,
        None,
        Some(json!({ "product_id": product_id, "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(id_of(&body), item_id);
    assert_eq!(body["data"]["quantity"], 3);

    let (status, _) = common::send(
        app(),
        "PUT",
        &format!("{items_uri}/{item_id}"),
        None,
        Some(json!({ "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, body) = common::send(app(), "GET", &cart_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(decimal(&body["data"]["total_price"]), dec!(45.00));

    let (status, body) = common::send(
        app(),
        "POST",
        "/api/orders",
        Some(&buyer),
        Some(json!({ "cart_id": cart_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["payment_status"], "P");
    assert_eq!(body["data"]["items"][0]["quantity"], 3);
    assert_eq!(decimal(&body["data"]["items"][0]["unit_price"]), dec!(15.00));
    let order_id = id_of(&body);
    let customer_id = body["data"]["customer"]["id"].as_i64().expect("customer id");

    let (status, _) = common::send(app(), "GET", &cart_uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = common::send(
        app(),
        "DELETE",
        &format!("/api/products/{product_id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let order_uri = format!("/api/orders/{order_id}");
    let (status, _) = common::send(app(), "GET", &order_uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = common::send(app(), "GET", &order_uri, Some(&buyer), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = common::send(
        app(),
        "POST",
        &format!("{order_uri}/cancel"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["payment_status"], "F");

    let customer_uri = format!("/api/customers/{customer_id}");
    let (status, _) = common::send(
        app(),
        "PUT",
        &customer_uri,
        Some(&admin),
        Some(json!({ "membership": "G", "phone": "555-0100", "birth_date": "1990-04-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = common::send(
        app(),
        "PATCH",
        &customer_uri,
        Some(&admin),
        Some(json!({ "phone": "555-9999" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["membership"], "G");
    assert_eq!(body["data"]["phone"], "555-9999");
    assert_eq!(body["data"]["birth_date"], "1990-04-01");

    let (status, _) = common::send(app(), "DELETE", &review_uri, None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = common::send(app(), "POST", "/api/carts", None, None).await;
    assert_eq!(status, StatusCode::CREATED);
    let spare_cart = format!("/api/carts/{}", body["data"]["id"].as_str().expect("cart id"));
    let (status, _) = common::send(app(), "DELETE", &spare_cart, None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}
