//! Declared item operations.
//!
//! Each REST endpoint is described once here (operation id, method, route,
//! tags, input schema, response schema). The MCP exposure builds its tools
//! from this table; the routes in [`crate::items::http`] are checked against
//! it by that module's tests.

use serde_json::{json, Value};

/// One declared operation of the item API.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    pub id: &'static str,
    pub method: &'static str,
    pub path: &'static str,
    pub tags: &'static [&'static str],
    pub summary: &'static str,
    pub input_schema: fn() -> Value,
    pub response_schema: fn() -> Value,
    pub response_example: fn() -> Value,
}

pub const LIST_ITEMS: &str = "list_items";
pub const GET_ITEM: &str = "get_item";
pub const CREATE_ITEM: &str = "create_item";
pub const UPDATE_ITEM: &str = "update_item";
pub const DELETE_ITEM: &str = "delete_item";
pub const SEARCH_ITEMS: &str = "search_items";

/// All operations served by [`crate::items::http::router`].
pub const OPERATIONS: &[Operation] = &[
    Operation {
        id: LIST_ITEMS,
        method: "GET",
        path: "/items/",
        tags: &["items"],
        summary: "List all items in the database, with skip/limit pagination.",
        input_schema: list_input_schema,
        response_schema: item_list_schema,
        response_example: item_list_example,
    },
    Operation {
        id: GET_ITEM,
        method: "GET",
        path: "/items/{item_id}",
        tags: &["items"],
        summary: "Get a specific item by its ID. Fails with 404 when the item does not exist.",
        input_schema: item_id_schema,
        response_schema: item_schema,
        response_example: item_example,
    },
    Operation {
        id: CREATE_ITEM,
        method: "POST",
        path: "/items/",
        tags: &["items"],
        summary: "Create a new item in the database and return it.",
        input_schema: item_schema,
        response_schema: item_schema,
        response_example: item_example,
    },
    Operation {
        id: UPDATE_ITEM,
        method: "PUT",
        path: "/items/{item_id}",
        tags: &["items"],
        summary: "Update an existing item. Fails with 404 when the item does not exist.",
        input_schema: update_input_schema,
        response_schema: item_schema,
        response_example: item_example,
    },
    Operation {
        id: DELETE_ITEM,
        method: "DELETE",
        path: "/items/{item_id}",
        tags: &["items"],
        summary: "Delete an item from the database. Fails with 404 when the item does not exist.",
        input_schema: item_id_schema,
        response_schema: message_schema,
        response_example: message_example,
    },
    Operation {
        id: SEARCH_ITEMS,
        method: "GET",
        path: "/items/search/",
        tags: &["search"],
        summary: "Search items by text, price range, and tags. Items must carry every requested tag.",
        input_schema: search_input_schema,
        response_schema: item_list_schema,
        response_example: item_list_example,
    },
];

/// Look up an operation by id.
pub fn find(id: &str) -> Option<&'static Operation> {
    OPERATIONS.iter().find(|op| op.id == id)
}

fn item_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": {"type": "integer"},
            "name": {"type": "string", "maxLength": 100},
            "description": {"type": ["string", "null"], "maxLength": 100},
            "price": {"type": "number"},
            "tags": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["id", "name", "price"]
    })
}

fn item_list_schema() -> Value {
    json!({"type": "array", "items": item_schema()})
}

fn item_id_schema() -> Value {
    json!({
        "type": "object",
        "properties": {"item_id": {"type": "integer"}},
        "required": ["item_id"]
    })
}

fn list_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "skip": {"type": "integer", "minimum": 0, "default": 0},
            "limit": {"type": "integer", "minimum": 0, "default": 10}
        }
    })
}

fn update_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "item_id": {"type": "integer"},
            "item": item_schema()
        },
        "required": ["item_id", "item"]
    })
}

fn search_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "q": {"type": "string", "description": "Matches item name or description"},
            "min_price": {"type": "number"},
            "max_price": {"type": "number"},
            "tags": {"type": "array", "items": {"type": "string"}}
        }
    })
}

fn message_schema() -> Value {
    json!({
        "type": "object",
        "properties": {"message": {"type": "string"}},
        "required": ["message"]
    })
}

fn item_example() -> Value {
    json!({
        "id": 1,
        "name": "Hammer",
        "description": "Tool for hammering nails",
        "price": 9.99,
        "tags": ["tool", "hardware"]
    })
}

fn item_list_example() -> Value {
    json!([item_example()])
}

fn message_example() -> Value {
    json!({"message": "Item deleted successfully"})
}
