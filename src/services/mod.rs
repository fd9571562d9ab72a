pub mod accounts;
pub mod addresses;
pub mod carts;
pub mod categories;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

pub use accounts::AccountService;
pub use addresses::AddressService;
pub use carts::CartService;
pub use categories::CategoryService;
pub use orders::OrderService;
pub use payments::PaymentService;
pub use products::ProductService;
pub use users::UserService;
