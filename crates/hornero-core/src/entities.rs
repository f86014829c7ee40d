//! Persisted bakery entities known to the scoping layer.
//!
//! Column names follow the existing schema; the tenant column is always
//! `panaderia_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scope::{EntityRegistry, RecordId, RegistryError};
use crate::tenant::TenantId;
use crate::{tenant_exempt, tenant_owned};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: RecordId,
    #[serde(rename = "panaderia_id")]
    pub tenant_id: TenantId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "contacto", default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "activo", default = "default_true")]
    pub is_active: bool,
}

tenant_owned!(Supplier, "Supplier", "proveedores");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: RecordId,
    #[serde(rename = "panaderia_id")]
    pub tenant_id: TenantId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "precio_venta")]
    pub sale_price: f64,
    #[serde(rename = "codigo_barras", default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(rename = "activo", default = "default_true")]
    pub is_active: bool,
}

tenant_owned!(Product, "Product", "productos");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMaterial {
    pub id: RecordId,
    #[serde(rename = "panaderia_id")]
    pub tenant_id: TenantId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "unidad_medida")]
    pub unit: String,
    #[serde(rename = "stock_actual", default)]
    pub stock: f64,
    #[serde(rename = "stock_minimo", default)]
    pub minimum_stock: f64,
}

tenant_owned!(RawMaterial, "RawMaterial", "materias_primas");

impl RawMaterial {
    pub fn needs_restock(&self) -> bool {
        self.stock <= self.minimum_stock
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: RecordId,
    #[serde(rename = "panaderia_id")]
    pub tenant_id: TenantId,
    pub total: f64,
    #[serde(rename = "metodo_pago")]
    pub payment_method: String,
    #[serde(rename = "usuario_id")]
    pub cashier_id: i64,
    #[serde(rename = "fecha_hora", default, skip_serializing_if = "Option::is_none")]
    pub sold_at: Option<DateTime<Utc>>,
}

tenant_owned!(Sale, "Sale", "ventas");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: RecordId,
    #[serde(rename = "panaderia_id")]
    pub tenant_id: TenantId,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "monto")]
    pub amount: f64,
}

tenant_owned!(Expense, "Expense", "gastos");

/// Subscription plan catalog, shared by every tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: RecordId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "precio_mensual")]
    pub monthly_price: f64,
}

tenant_exempt!(SubscriptionPlan, "SubscriptionPlan", "planes");

fn default_true() -> bool {
    true
}

/// Allow-list of every entity above.
pub fn bakery_registry() -> Result<EntityRegistry, RegistryError> {
    EntityRegistry::new()
        .register::<Supplier>()?
        .register::<Product>()?
        .register::<RawMaterial>()?
        .register::<Sale>()?
        .register::<Expense>()?
        .register::<SubscriptionPlan>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{Entity, Tenancy};
    use serde_json::json;

    #[test]
    fn supplier_decodes_from_schema_columns() {
        let supplier: Supplier = serde_json::from_value(json!({
            "id": 42,
            "panaderia_id": 5,
            "nombre": "Molinos del Sur",
            "telefono": "555-0101"
        }))
        .unwrap();

        assert_eq!(supplier.owner(), Some(TenantId::new(5)));
        assert_eq!(supplier.id(), 42);
        assert_eq!(supplier.phone.as_deref(), Some("555-0101"));
        assert!(supplier.is_active);
    }

    #[test]
    fn plan_has_no_owner() {
        let plan = SubscriptionPlan {
            id: 1,
            name: "basico".to_string(),
            monthly_price: 0.0,
        };
        assert_eq!(plan.owner(), None);
        assert_eq!(SubscriptionPlan::TENANCY, Tenancy::Exempt);
    }

    #[test]
    fn registry_lists_every_table_once() {
        let registry = bakery_registry().unwrap();
        let owned = registry.tables().filter(|info| info.is_owned()).count();
        assert_eq!(registry.tables().count(), 6);
        assert_eq!(owned, 5);
    }

    #[test]
    fn restock_threshold_is_inclusive() {
        let material = RawMaterial {
            id: 1,
            tenant_id: TenantId::new(3),
            name: "Harina 000".to_string(),
            unit: "kg".to_string(),
            stock: 10.0,
            minimum_stock: 10.0,
        };
        assert!(material.needs_restock());
    }
}
