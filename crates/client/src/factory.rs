//! Assembly of the proxy constructor table.
//!
//! The proxy set is closed and known at startup; the driver announcing a
//! type tag outside this table is a protocol error that closes the
//! connection.

use drover_runtime::ConstructorTable;

use crate::objects::{Browser, DriverRoot, Frame, Page};

/// Builds the constructor table for every proxy kind this client speaks.
pub fn constructor_table() -> ConstructorTable {
    let mut table = ConstructorTable::new();
    table.register("DriverRoot", DriverRoot::construct);
    table.register("Browser", Browser::construct);
    table.register("Page", Page::construct);
    table.register("Frame", Frame::construct);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_every_proxy_kind() {
        let table = constructor_table();
        for tag in ["DriverRoot", "Browser", "Page", "Frame"] {
            assert!(table.contains(tag), "missing constructor for {tag}");
        }
        assert_eq!(table.type_tags().count(), 4);
    }
}
