use serde::{Deserialize, Serialize};

use super::Record;
use crate::error::ImportError;
use crate::transfer::{CsvRecord, Row};
use crate::view::{Filterable, SortValue, Sortable, StockStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub min_stock_level: i64,
    pub unit_price: f64,
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl Item {
    pub fn status(&self) -> StockStatus {
        StockStatus::from_levels(self.quantity, self.min_stock_level)
    }

    /// Stock value at unit price.
    pub fn value(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}

impl Record for Supplier {
    const KEY: &'static str = "inventory.suppliers";
    const LABEL: &'static str = "supplier";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Record for Item {
    const KEY: &'static str = "inventory.items";
    const LABEL: &'static str = "item";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl CsvRecord for Supplier {
    const COLUMNS: &'static [&'static str] = &["Name", "Contact", "Email", "Phone"];
    const REQUIRED: &'static [&'static str] = &["Name"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.contact.clone().unwrap_or_default(),
            self.email.clone().unwrap_or_default(),
            self.phone.clone().unwrap_or_default(),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(Supplier {
            id: String::new(),
            name: row.required("Name", "Unnamed supplier")?,
            contact: row.text("Contact"),
            email: row.text("Email"),
            phone: row.text("Phone"),
        })
    }
}

impl CsvRecord for Item {
    const COLUMNS: &'static [&'static str] = &[
        "SKU",
        "Name",
        "Category",
        "Quantity",
        "Min Stock Level",
        "Unit Price",
        "Supplier ID",
        "Location",
    ];
    const REQUIRED: &'static [&'static str] = &["SKU", "Name"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.sku.clone(),
            self.name.clone(),
            self.category.clone(),
            self.quantity.to_string(),
            self.min_stock_level.to_string(),
            self.unit_price.to_string(),
            self.supplier_id.clone().unwrap_or_default(),
            self.location.clone().unwrap_or_default(),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(Item {
            id: String::new(),
            sku: row.required("SKU", "")?,
            name: row.required("Name", "Unnamed item")?,
            category: row.required("Category", "Uncategorized")?,
            quantity: row.number("Quantity", 0)?,
            min_stock_level: row.number("Min Stock Level", 0)?,
            unit_price: row.number("Unit Price", 0.0)?,
            supplier_id: row.text("Supplier ID"),
            location: row.text("Location"),
        })
    }
}

impl Filterable for Supplier {
    const FACETS: &'static [&'static str] = &[];

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.contact.as_deref());
        fields.extend(self.email.as_deref());
        fields
    }

    fn facet(&self, _name: &str) -> Option<String> {
        None
    }
}

impl Sortable for Supplier {
    const SORT_KEYS: &'static [&'static str] = &["name", "contact", "email"];

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "contact" => SortValue::opt_text(self.contact.as_deref()),
            "email" => SortValue::opt_text(self.email.as_deref()),
            _ => SortValue::text(&self.name),
        }
    }
}

impl Filterable for Item {
    const FACETS: &'static [&'static str] = &["category", "status", "supplier", "location"];

    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.sku.as_str(), self.category.as_str()]
    }

    fn facet(&self, name: &str) -> Option<String> {
        match name {
            "category" => Some(self.category.clone()),
            "status" => Some(self.status().to_string()),
            "supplier" => self.supplier_id.clone(),
            "location" => self.location.clone(),
            _ => None,
        }
    }
}

impl Sortable for Item {
    const SORT_KEYS: &'static [&'static str] = &[
        "sku",
        "name",
        "category",
        "quantity",
        "min_stock_level",
        "unit_price",
        "value",
        "status",
    ];

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "sku" => SortValue::text(&self.sku),
            "category" => SortValue::text(&self.category),
            "quantity" => SortValue::Number(self.quantity as f64),
            "min_stock_level" => SortValue::Number(self.min_stock_level as f64),
            "unit_price" => SortValue::Number(self.unit_price),
            "value" => SortValue::Number(self.value()),
            "status" => SortValue::owned(self.status().to_string()),
            _ => SortValue::text(&self.name),
        }
    }
}

pub fn seed_suppliers() -> Vec<Supplier> {
    vec![
        Supplier {
            id: "supplier-1".to_string(),
            name: "Northwind Components".to_string(),
            contact: Some("Dana Reyes".to_string()),
            email: Some("orders@northwind.test".to_string()),
            phone: Some("555-0142".to_string()),
        },
        Supplier {
            id: "supplier-2".to_string(),
            name: "Harbor Office Supply".to_string(),
            contact: Some("Luis Ortega".to_string()),
            email: Some("sales@harbor.test".to_string()),
            phone: None,
        },
    ]
}

pub fn seed_items() -> Vec<Item> {
    let item = |id: &str, sku: &str, name: &str, category: &str, quantity, min, price, supplier: &str, location: &str| Item {
        id: id.to_string(),
        sku: sku.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        quantity,
        min_stock_level: min,
        unit_price: price,
        supplier_id: Some(supplier.to_string()),
        location: Some(location.to_string()),
    };
    vec![
        item("item-1", "ELC-001", "USB-C Cable", "Electronics", 35, 40, 9.99, "supplier-1", "Aisle 3"),
        item("item-2", "ELC-002", "Wireless Mouse", "Electronics", 0, 15, 24.5, "supplier-1", "Aisle 3"),
        item("item-3", "OFF-001", "A4 Copy Paper", "Office", 150, 50, 4.25, "supplier-2", "Aisle 1"),
        item("item-4", "OFF-002", "Stapler", "Office", 22, 10, 7.8, "supplier-2", "Aisle 1"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{import_csv, CsvDialect, ImportPolicy};

    #[test]
    fn test_seed_stock_status() {
        let items = seed_items();
        assert_eq!(items[0].status(), StockStatus::LowStock);
        assert_eq!(items[1].status(), StockStatus::OutOfStock);
        assert_eq!(items[2].status(), StockStatus::InStock);
    }

    #[test]
    fn test_value() {
        let items = seed_items();
        assert!((items[2].value() - 637.5).abs() < 1e-9);
    }

    #[test]
    fn test_lenient_import_defaults() {
        let items: Vec<Item> = import_csv(
            "SKU,Name,Quantity,Unit Price\nTLS-9,Hammer,lots,\nTLS-10\n",
            CsvDialect::Legacy,
            ImportPolicy::Lenient,
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity, 0);
        assert_eq!(items[0].unit_price, 0.0);
        assert_eq!(items[0].category, "Uncategorized");
        assert_eq!(items[1].name, "Unnamed item");
    }

    #[test]
    fn test_status_facet() {
        let items = seed_items();
        assert_eq!(items[0].facet("status").as_deref(), Some("Low Stock"));
        assert_eq!(items[0].facet("colour"), None);
    }
}
