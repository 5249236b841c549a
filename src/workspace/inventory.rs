//! Stock keeping: suppliers and the items they provide.

use super::{
    entry_for, export_from, import_into, json, number, number_or, reference, required, roll_back, save,
    unknown_field, AppKind, DeleteReport, EntityKind, Entry, FormState, ImportOptions, Stat,
    Workspace,
};
use crate::entity::inventory::{seed_items, seed_suppliers, Item, Supplier};
use crate::entity::{non_blank, resolve_label};
use crate::error::{Result, ValidationError};
use crate::storage::{Collection, KvBackend, Patch};
use crate::transfer::{self, Format, ImportPolicy};
use crate::view::{project, rate, Query, Rounding, Sentinel, SortState, StockStatus};
use crate::warnings::{check_references, Warning};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryKind {
    Supplier,
    Item,
}

impl EntityKind for InventoryKind {
    const ALL: &'static [Self] = &[InventoryKind::Supplier, InventoryKind::Item];
}

impl std::fmt::Display for InventoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryKind::Supplier => write!(f, "suppliers"),
            InventoryKind::Item => write!(f, "items"),
        }
    }
}

impl std::str::FromStr for InventoryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "supplier" | "suppliers" => Ok(InventoryKind::Supplier),
            "item" | "items" | "stock" => Ok(InventoryKind::Item),
            _ => Err(format!(
                "Unknown collection '{}'. Valid collections: suppliers, items",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplierForm {
    pub name: String,
    pub contact: String,
    pub email: String,
    pub phone: String,
}

impl SupplierForm {
    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let slot = match field {
            "name" => &mut self.name,
            "contact" => &mut self.contact,
            "email" => &mut self.email,
            "phone" => &mut self.phone,
            _ => return Err(unknown_field(field)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("contact", self.contact.clone()),
            ("email", self.email.clone()),
            ("phone", self.phone.clone()),
        ]
    }

    fn validate(&self) -> std::result::Result<Supplier, ValidationError> {
        Ok(Supplier {
            id: String::new(),
            name: required("name", &self.name)?,
            contact: non_blank(&self.contact),
            email: non_blank(&self.email),
            phone: non_blank(&self.phone),
        })
    }
}

impl From<&Supplier> for SupplierForm {
    fn from(supplier: &Supplier) -> Self {
        Self {
            name: supplier.name.clone(),
            contact: supplier.contact.clone().unwrap_or_default(),
            email: supplier.email.clone().unwrap_or_default(),
            phone: supplier.phone.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemForm {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub quantity: String,
    pub min_stock_level: String,
    pub unit_price: String,
    pub supplier_id: String,
    pub location: String,
}

impl ItemForm {
    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let slot = match field {
            "sku" => &mut self.sku,
            "name" => &mut self.name,
            "category" => &mut self.category,
            "quantity" => &mut self.quantity,
            "min_stock_level" | "min" => &mut self.min_stock_level,
            "unit_price" | "price" => &mut self.unit_price,
            "supplier_id" | "supplier" => &mut self.supplier_id,
            "location" => &mut self.location,
            _ => return Err(unknown_field(field)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("sku", self.sku.clone()),
            ("name", self.name.clone()),
            ("category", self.category.clone()),
            ("quantity", self.quantity.clone()),
            ("min_stock_level", self.min_stock_level.clone()),
            ("unit_price", self.unit_price.clone()),
            ("supplier_id", self.supplier_id.clone()),
            ("location", self.location.clone()),
        ]
    }

    fn validate(&self, suppliers: &Collection<Supplier>) -> std::result::Result<Item, ValidationError> {
        let quantity: i64 = number("quantity", &self.quantity)?;
        if quantity < 0 {
            return Err(ValidationError::new("quantity", "cannot be negative"));
        }
        let min_stock_level: i64 = number_or("min_stock_level", &self.min_stock_level, 0)?;
        if min_stock_level < 0 {
            return Err(ValidationError::new("min_stock_level", "cannot be negative"));
        }
        let unit_price: f64 = number("unit_price", &self.unit_price)?;
        if !unit_price.is_finite() || unit_price < 0.0 {
            return Err(ValidationError::new("unit_price", "cannot be negative"));
        }
        Ok(Item {
            id: String::new(),
            sku: required("sku", &self.sku)?,
            name: required("name", &self.name)?,
            category: required("category", &self.category)?,
            quantity,
            min_stock_level,
            unit_price,
            supplier_id: reference("supplier_id", &self.supplier_id, suppliers)?,
            location: non_blank(&self.location),
        })
    }
}

impl From<&Item> for ItemForm {
    fn from(item: &Item) -> Self {
        Self {
            sku: item.sku.clone(),
            name: item.name.clone(),
            category: item.category.clone(),
            quantity: item.quantity.to_string(),
            min_stock_level: item.min_stock_level.to_string(),
            unit_price: item.unit_price.to_string(),
            supplier_id: item.supplier_id.clone().unwrap_or_default(),
            location: item.location.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryForm {
    Supplier(SupplierForm),
    Item(ItemForm),
}

impl FormState for InventoryForm {
    type Kind = InventoryKind;

    fn kind(&self) -> InventoryKind {
        match self {
            InventoryForm::Supplier(_) => InventoryKind::Supplier,
            InventoryForm::Item(_) => InventoryKind::Item,
        }
    }

    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        match self {
            InventoryForm::Supplier(form) => form.set(field, value),
            InventoryForm::Item(form) => form.set(field, value),
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            InventoryForm::Supplier(form) => form.fields(),
            InventoryForm::Item(form) => form.fields(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InventoryWorkspace {
    pub suppliers: Collection<Supplier>,
    pub items: Collection<Item>,
}

impl InventoryWorkspace {
    /// Number of items in each stock bucket.
    pub fn stock_counts(&self) -> (usize, usize, usize) {
        self.items
            .iter()
            .fold((0, 0, 0), |(out, low, ok), item| match item.status() {
                StockStatus::OutOfStock => (out + 1, low, ok),
                StockStatus::LowStock => (out, low + 1, ok),
                StockStatus::InStock => (out, low, ok + 1),
            })
    }

    pub fn total_value(&self) -> f64 {
        Rounding::OneDecimal.apply(self.items.iter().map(Item::value).sum())
    }

    fn supplier_name(&self, id: Option<&str>) -> &str {
        resolve_label(self.suppliers.records(), id, |s| &s.name)
    }

    fn supplier_entry(&self, supplier: &Supplier) -> Result<Entry> {
        let items = self
            .items
            .iter()
            .filter(|i| i.supplier_id.as_deref() == Some(supplier.id.as_str()))
            .count();
        let summary = format!(
            "{} | {} | {} item(s)",
            supplier.name,
            supplier.contact.as_deref().unwrap_or("-"),
            items
        );
        entry_for(supplier, summary, &[("items", json(items))])
    }

    fn item_entry(&self, item: &Item) -> Result<Entry> {
        let supplier = self.supplier_name(item.supplier_id.as_deref());
        let summary = format!(
            "{} {} | {} | qty {} (min {}) | {} | {:.2}",
            item.sku,
            item.name,
            item.category,
            item.quantity,
            item.min_stock_level,
            item.status(),
            item.unit_price
        );
        entry_for(
            item,
            summary,
            &[
                ("status", json(item.status())),
                ("value", json(item.value())),
                ("supplier_name", json(supplier)),
            ],
        )
    }
}

impl Workspace for InventoryWorkspace {
    type Kind = InventoryKind;
    type Form = InventoryForm;

    const APP: AppKind = AppKind::Inventory;
    const IMPORT_POLICY: ImportPolicy = ImportPolicy::Lenient;
    const SENTINEL: Sentinel = Sentinel::Zero;

    fn load(backend: &mut dyn KvBackend) -> (Self, Vec<Warning>) {
        let (suppliers, w1) = Collection::load(backend, seed_suppliers);
        let (items, w2) = Collection::load(backend, seed_items);
        let mut warnings: Vec<Warning> = [w1, w2].into_iter().flatten().collect();
        warnings.extend(check_references(
            "item",
            "supplier_id",
            items.iter().filter_map(|i: &Item| i.supplier_id.as_deref()),
            |id| suppliers.contains(id),
        ));
        (Self { suppliers, items }, warnings)
    }

    fn blank_form(kind: InventoryKind) -> InventoryForm {
        match kind {
            InventoryKind::Supplier => InventoryForm::Supplier(SupplierForm::default()),
            InventoryKind::Item => InventoryForm::Item(ItemForm::default()),
        }
    }

    fn edit_form(&self, kind: InventoryKind, id: &str) -> Result<InventoryForm> {
        Ok(match kind {
            InventoryKind::Supplier => InventoryForm::Supplier(self.suppliers.require(id)?.into()),
            InventoryKind::Item => InventoryForm::Item(self.items.require(id)?.into()),
        })
    }

    fn submit(
        &mut self,
        backend: &mut dyn KvBackend,
        form: &InventoryForm,
        target: Option<&str>,
    ) -> Result<String> {
        match form {
            InventoryForm::Supplier(form) => {
                let supplier = form.validate()?;
                save(&mut self.suppliers, backend, supplier, target)
            }
            InventoryForm::Item(form) => {
                let item = form.validate(&self.suppliers)?;
                save(&mut self.items, backend, item, target)
            }
        }
    }

    fn patch(
        &mut self,
        backend: &mut dyn KvBackend,
        kind: InventoryKind,
        id: &str,
        patch: &Patch,
    ) -> Result<String> {
        match kind {
            InventoryKind::Supplier => self.suppliers.update(backend, id, patch).map(|r| r.id),
            InventoryKind::Item => self.items.update(backend, id, patch).map(|r| r.id),
        }
    }

    fn delete(&mut self, backend: &mut dyn KvBackend, kind: InventoryKind, id: &str) -> Result<DeleteReport> {
        match kind {
            InventoryKind::Supplier => {
                self.suppliers.require(id)?;
                let items_before = self.items.snapshot();
                let unlinked = self.items.update_where(
                    backend,
                    |i| i.supplier_id.as_deref() == Some(id),
                    |i| i.supplier_id = None,
                )?;
                let supplier = match self.suppliers.delete(backend, id) {
                    Ok(supplier) => supplier,
                    Err(e) => {
                        roll_back(&mut self.items, backend, items_before);
                        return Err(e);
                    }
                };
                Ok(DeleteReport {
                    label: supplier.name,
                    cascaded: 0,
                    unlinked,
                })
            }
            InventoryKind::Item => {
                let item = self.items.delete(backend, id)?;
                Ok(DeleteReport {
                    label: item.name,
                    ..DeleteReport::default()
                })
            }
        }
    }

    fn import(
        &mut self,
        backend: &mut dyn KvBackend,
        kind: InventoryKind,
        text: &str,
        options: &ImportOptions,
    ) -> Result<usize> {
        match kind {
            InventoryKind::Supplier => import_into(&mut self.suppliers, backend, text, options),
            InventoryKind::Item => import_into(&mut self.items, backend, text, options),
        }
    }

    fn export(&self, kind: InventoryKind, format: Format) -> Result<String> {
        match kind {
            InventoryKind::Supplier => export_from(&self.suppliers, format),
            InventoryKind::Item => export_from(&self.items, format),
        }
    }

    fn template(kind: InventoryKind) -> String {
        match kind {
            InventoryKind::Supplier => transfer::template::<Supplier>(),
            InventoryKind::Item => transfer::template::<Item>(),
        }
    }

    fn listing(&self, kind: InventoryKind, query: &Query, sort: &SortState) -> Result<Vec<Entry>> {
        match kind {
            InventoryKind::Supplier => project(self.suppliers.records(), query, sort)?
                .into_iter()
                .map(|s| self.supplier_entry(s))
                .collect(),
            InventoryKind::Item => project(self.items.records(), query, sort)?
                .into_iter()
                .map(|i| self.item_entry(i))
                .collect(),
        }
    }

    fn entry(&self, kind: InventoryKind, id: &str) -> Result<Entry> {
        match kind {
            InventoryKind::Supplier => self.supplier_entry(self.suppliers.require(id)?),
            InventoryKind::Item => self.item_entry(self.items.require(id)?),
        }
    }

    fn dashboard(&self) -> Vec<Stat> {
        let (out, low, ok) = self.stock_counts();
        let categories: std::collections::BTreeSet<&str> =
            self.items.iter().map(|i| i.category.as_str()).collect();
        vec![
            Stat::new("Items", self.items.len()),
            Stat::new("Suppliers", self.suppliers.len()),
            Stat::new("Categories", categories.len()),
            Stat::new("Stock value", format!("{:.2}", self.total_value())),
            Stat::new("In stock", ok),
            Stat::new("Low stock", low),
            Stat::new("Out of stock", out),
            Stat::new(
                "In-stock rate %",
                rate(ok, self.items.len(), Rounding::Integer, Self::SENTINEL),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use crate::transfer::CsvDialect;

    fn workspace() -> (InventoryWorkspace, MemoryBackend) {
        let mut backend = MemoryBackend::new();
        let (ws, warnings) = InventoryWorkspace::load(&mut backend);
        assert!(warnings.is_empty());
        (ws, backend)
    }

    #[test]
    fn test_stock_counts() {
        let (ws, _) = workspace();
        assert_eq!(ws.stock_counts(), (1, 1, 2));
    }

    #[test]
    fn test_filter_by_status() {
        let (ws, _) = workspace();
        let query = Query::new().with_facet("status", "Low Stock");
        let rows = ws.listing(InventoryKind::Item, &query, &SortState::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].detail["sku"], "ELC-001");
        assert_eq!(rows[0].detail["status"], "Low Stock");
    }

    #[test]
    fn test_unknown_filter_rejected() {
        let (ws, _) = workspace();
        let query = Query::new().with_facet("colour", "red");
        assert!(ws.listing(InventoryKind::Item, &query, &SortState::new()).is_err());
    }

    #[test]
    fn test_delete_supplier_unlinks_items() {
        let (mut ws, mut backend) = workspace();
        let report = ws.delete(&mut backend, InventoryKind::Supplier, "supplier-1").unwrap();
        assert_eq!(report.unlinked, 2);
        assert_eq!(ws.items.len(), 4);
        let entry = ws.entry(InventoryKind::Item, "item-1").unwrap();
        assert_eq!(entry.detail["supplier_name"], "Unassigned");
    }

    #[test]
    fn test_lenient_import_keeps_good_rows() {
        let (mut ws, mut backend) = workspace();
        let options = ImportOptions {
            format: Format::Csv,
            dialect: CsvDialect::Legacy,
            policy: ImportPolicy::Lenient,
        };
        let added = ws
            .import(
                &mut backend,
                InventoryKind::Item,
                "SKU,Name,Category,Quantity\nTLS-1,Hammer,Tools,12\nTLS-2,Saw,Tools,several\n",
                &options,
            )
            .unwrap();
        assert_eq!(added, 2);
        let saw = ws.items.records().last().unwrap();
        assert_eq!(saw.quantity, 0);
        assert_eq!(saw.status(), StockStatus::OutOfStock);
    }

    #[test]
    fn test_submit_rejects_negative_quantity() {
        let (mut ws, mut backend) = workspace();
        let mut form = InventoryWorkspace::blank_form(InventoryKind::Item);
        for (field, value) in [
            ("sku", "TLS-3"),
            ("name", "Drill"),
            ("category", "Tools"),
            ("quantity", "-1"),
            ("unit_price", "49.99"),
        ] {
            form.set(field, value).unwrap();
        }
        assert!(ws.submit(&mut backend, &form, None).is_err());
        assert_eq!(ws.items.len(), 4);

        form.set("quantity", "3").unwrap();
        let id = ws.submit(&mut backend, &form, None).unwrap();
        assert_eq!(ws.items.get(&id).unwrap().min_stock_level, 0);
    }

    #[test]
    fn test_empty_dashboard_uses_zero() {
        let mut backend = MemoryBackend::new();
        let (mut ws, _) = InventoryWorkspace::load(&mut backend);
        ws.items.remove_where(&mut backend, |_| true).unwrap();
        let stats = ws.dashboard();
        let rate = stats.iter().find(|s| s.label == "In-stock rate %").unwrap();
        assert_eq!(rate.value, "0");
    }
}
