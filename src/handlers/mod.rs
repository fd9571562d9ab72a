pub mod addresses;
pub mod auth;
pub mod carts;
pub mod categories;
pub mod common;
pub mod health;
pub mod orders;
pub mod products;
pub mod users;
pub mod webhooks;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    payment::PaymentGateway,
    services::{
        AccountService, AddressService, CartService, CategoryService, OrderService,
        PaymentService, ProductService, UserService,
    },
};
use std::sync::Arc;

/// Service container shared across handlers through [`crate::AppState`].
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub users: Arc<UserService>,
    pub addresses: Arc<AddressService>,
    pub categories: Arc<CategoryService>,
    pub products: Arc<ProductService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        config: Arc<AppConfig>,
        auth: Arc<AuthService>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(db.clone(), auth.clone())),
            users: Arc::new(UserService::new(db.clone(), auth)),
            addresses: Arc::new(AddressService::new(db.clone())),
            categories: Arc::new(CategoryService::new(db.clone())),
            products: Arc::new(ProductService::new(db.clone())),
            carts: Arc::new(CartService::new(db.clone())),
            orders: Arc::new(OrderService::new(db.clone(), event_sender.clone())),
            payments: Arc::new(PaymentService::new(db, gateway, config, event_sender)),
        }
    }
}
