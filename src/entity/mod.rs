pub mod audit_logs;
pub mod cart_items;
pub mod carts;
pub mod categories;
pub mod invoices;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod sea_orm_active_enums;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use categories::Entity as Categories;
pub use invoices::Entity as Invoices;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use users::Entity as Users;
