//! Shared fixture model for integration tests.

#![allow(dead_code)]

use orql::metadata::{EntityDefinition, InMemoryMetadata};

pub const AUDITABLE: &str = "com.example.Auditable";

/// A small banking and ordering model:
///
/// - `Account` / `Fund` both implement `com.example.Auditable`
/// - `SavingsAccount` extends `Account` and spans three tables
/// - `Order` has to-one `customer` and `savings`, an indexed `items` list and a `tags` set
/// - `Region` is mapped to a derived table
pub fn model() -> InMemoryMetadata {
    InMemoryMetadata::builder()
        .entity(
            EntityDefinition::new("Customer")
                .class("com.example.Customer")
                .table("customers")
                .attribute("id", "long")
                .attribute("name", "string")
                .collection("accounts", "set<Account>", "owner_id", None),
        )
        .entity(
            EntityDefinition::new("Account")
                .class("com.example.Account")
                .implements(AUDITABLE)
                .table("accounts")
                .attribute("id", "long")
                .attribute("name", "string")
                .attribute("balance", "decimal")
                .attribute_in("createdBy", "string", "created_by")
                .attribute("owner", "Customer"),
        )
        .entity(
            EntityDefinition::new("SavingsAccount")
                .class("com.example.SavingsAccount")
                .extends("Account")
                .table("savings_accounts")
                .key_column("account_id")
                .attribute("rate", "decimal")
                .attribute("note", "string")
                .secondary_table("savings_notes", "account_id", &["note"], true),
        )
        .entity(
            EntityDefinition::new("Fund")
                .class("com.example.Fund")
                .implements(AUDITABLE)
                .table("funds")
                .attribute("id", "long")
                .attribute("name", "string")
                .attribute_in("createdBy", "string", "created_by")
                .attribute("owner", "Customer"),
        )
        .entity(
            EntityDefinition::new("Order")
                .class("com.example.Order")
                .table("orders")
                .attribute("id", "long")
                .attribute("total", "decimal")
                .attribute("customer", "Customer")
                .attribute("savings", "SavingsAccount")
                .collection("items", "list<LineItem>", "order_id", Some("position"))
                .collection("tags", "set<Tag>", "order_id", None),
        )
        .entity(
            EntityDefinition::new("LineItem")
                .table("line_items")
                .attribute("id", "long")
                .attribute("quantity", "integer")
                .attribute("price", "decimal"),
        )
        .entity(
            EntityDefinition::new("Tag")
                .table("tags")
                .attribute("id", "long")
                .attribute("label", "string"),
        )
        .entity(
            EntityDefinition::new("Region")
                .table("(select id, name from regions where active = 1)")
                .attribute("id", "long")
                .attribute("name", "string"),
        )
        .build()
        .expect("fixture model is valid")
}
