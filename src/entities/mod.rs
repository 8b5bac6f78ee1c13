pub mod customer;
pub mod item;
pub mod order;
pub mod order_item;
pub mod shipping_address;

pub use customer::Entity as Customer;
pub use item::Entity as Item;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use shipping_address::Entity as ShippingAddress;

pub use customer::Model as CustomerModel;
pub use item::Model as ItemModel;
pub use order::Model as OrderModel;
pub use order_item::Model as OrderItemModel;
pub use shipping_address::Model as ShippingAddressModel;
