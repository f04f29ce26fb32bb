// ============================================================================
// Table Mapping
// ============================================================================
//
// Closed set of synchronized tables. Every in-memory collection name maps to
// exactly one remote table identifier; the match arms below are exhaustive,
// so adding a variant without a mapping does not compile.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a table holds many records or one fixed-key document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Collection,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TableId {
    Users,
    Clients,
    Transactions,
    Products,
    StockMovements,
    Courses,
    Students,
    Enrollments,
    ScheduleEntries,
    StudioBookings,
    DecorProjects,
    ShopOrders,
    WifiTickets,
    Employees,
    PayrollEntries,
    SecurityIncidents,
    ActivityLog,
    Settings,
}

impl TableId {
    pub const ALL: [TableId; 18] = [
        TableId::Users,
        TableId::Clients,
        TableId::Transactions,
        TableId::Products,
        TableId::StockMovements,
        TableId::Courses,
        TableId::Students,
        TableId::Enrollments,
        TableId::ScheduleEntries,
        TableId::StudioBookings,
        TableId::DecorProjects,
        TableId::ShopOrders,
        TableId::WifiTickets,
        TableId::Employees,
        TableId::PayrollEntries,
        TableId::SecurityIncidents,
        TableId::ActivityLog,
        TableId::Settings,
    ];

    /// Name of the in-memory collection
    pub fn collection_name(self) -> &'static str {
        match self {
            TableId::Users => "users",
            TableId::Clients => "clients",
            TableId::Transactions => "transactions",
            TableId::Products => "products",
            TableId::StockMovements => "stockMovements",
            TableId::Courses => "courses",
            TableId::Students => "students",
            TableId::Enrollments => "enrollments",
            TableId::ScheduleEntries => "scheduleEntries",
            TableId::StudioBookings => "studioBookings",
            TableId::DecorProjects => "decorProjects",
            TableId::ShopOrders => "shopOrders",
            TableId::WifiTickets => "wifiTickets",
            TableId::Employees => "employees",
            TableId::PayrollEntries => "payrollEntries",
            TableId::SecurityIncidents => "securityIncidents",
            TableId::ActivityLog => "activityLog",
            TableId::Settings => "settings",
        }
    }

    /// Identifier of the remote table backing this collection
    pub fn remote_name(self) -> &'static str {
        match self {
            TableId::Users => "users",
            TableId::Clients => "clients",
            TableId::Transactions => "transactions",
            TableId::Products => "products",
            TableId::StockMovements => "stock_movements",
            TableId::Courses => "courses",
            TableId::Students => "students",
            TableId::Enrollments => "enrollments",
            TableId::ScheduleEntries => "schedule_entries",
            TableId::StudioBookings => "studio_bookings",
            TableId::DecorProjects => "decor_projects",
            TableId::ShopOrders => "shop_orders",
            TableId::WifiTickets => "wifi_tickets",
            TableId::Employees => "employees",
            TableId::PayrollEntries => "payroll_entries",
            TableId::SecurityIncidents => "security_incidents",
            TableId::ActivityLog => "activity_log",
            TableId::Settings => "settings",
        }
    }

    pub fn kind(self) -> TableKind {
        match self {
            TableId::Settings => TableKind::Document,
            _ => TableKind::Collection,
        }
    }

    pub fn is_document(self) -> bool {
        self.kind() == TableKind::Document
    }

    pub fn from_collection_name(name: &str) -> Option<TableId> {
        TableId::ALL
            .into_iter()
            .find(|table| table.collection_name() == name)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_name())
    }
}

/// Resolves a free-form collection name to its remote table identifier.
///
/// Unmapped names are returned unchanged.
pub fn remote_table_name(collection: &str) -> &str {
    match TableId::from_collection_name(collection) {
        Some(table) => table.remote_name(),
        None => collection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_schedule_entries_maps_to_snake_case() {
        assert_eq!(TableId::ScheduleEntries.remote_name(), "schedule_entries");
        assert_eq!(remote_table_name("scheduleEntries"), "schedule_entries");
    }

    #[test]
    fn test_unmapped_name_falls_back_unchanged() {
        assert_eq!(remote_table_name("legacyNotes"), "legacyNotes");
    }

    #[test]
    fn test_names_are_unique() {
        let collections: HashSet<_> = TableId::ALL.iter().map(|t| t.collection_name()).collect();
        let remotes: HashSet<_> = TableId::ALL.iter().map(|t| t.remote_name()).collect();

        assert_eq!(collections.len(), TableId::ALL.len());
        assert_eq!(remotes.len(), TableId::ALL.len());
    }

    #[test]
    fn test_collection_name_round_trips() {
        for table in TableId::ALL {
            assert_eq!(TableId::from_collection_name(table.collection_name()), Some(table));
        }
    }

    #[test]
    fn test_serde_uses_collection_names() {
        let json = serde_json::to_string(&TableId::WifiTickets).unwrap();
        assert_eq!(json, "\"wifiTickets\"");

        let parsed: TableId = serde_json::from_str("\"payrollEntries\"").unwrap();
        assert_eq!(parsed, TableId::PayrollEntries);
    }

    #[test]
    fn test_only_settings_is_a_document() {
        let documents: Vec<_> = TableId::ALL.into_iter().filter(|t| t.is_document()).collect();
        assert_eq!(documents, vec![TableId::Settings]);
    }
}
