//! Supplier ("proveedor") resource.
//!
//! Single-record routes load the supplier by primary key and pass it through
//! the ownership verifier before reading or mutating it, so a foreign id is
//! reported as a violation instead of a silent miss.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use hornero_core::entities::Supplier;
use hornero_core::permission::Area;
use hornero_core::query::{Assignments, Filter};
use hornero_core::scope::{Entity, RecordId, Repository, Store, ID_COLUMN, TENANT_COLUMN};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use super::authorize;
use crate::auth::Session;
use crate::error::ApiError;
use crate::state::AppState;
use crate::tenancy::Tenancy;

#[derive(Debug, Default, Deserialize)]
pub struct SupplierQuery {
    pub activo: Option<bool>,
    pub nombre: Option<String>,
}

impl SupplierQuery {
    fn into_filter(self) -> Filter {
        let mut filter = Filter::new();
        if let Some(active) = self.activo {
            filter = filter.eq("activo", active);
        }
        if let Some(name) = self.nombre {
            filter = filter.eq("nombre", name);
        }
        filter
    }
}

fn repository<'a>(state: &'a AppState, tenancy: &'a Tenancy) -> Repository<'a, Supplier, dyn Store> {
    Repository::new(state.store.as_ref(), tenancy.context())
}

/// Body of a create. Only these columns are writable, with these types.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupplierInput {
    pub nombre: String,
    pub contacto: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub activo: Option<bool>,
    pub panaderia_id: Option<i64>,
}

impl SupplierInput {
    fn into_assignments(self) -> Result<Assignments, ApiError> {
        let mut values = Assignments::new().set("nombre", non_blank(self.nombre)?);
        for (column, value) in [
            ("contacto", self.contacto),
            ("telefono", self.telefono),
            ("email", self.email),
        ] {
            if let Some(value) = value {
                values = values.set(column, value);
            }
        }
        if let Some(active) = self.activo {
            values = values.set("activo", active);
        }
        if let Some(tenant) = self.panaderia_id {
            values = values.set(TENANT_COLUMN, tenant);
        }
        Ok(values)
    }
}

/// Body of an update. An absent column is left alone; `null` clears the
/// optional text columns and is rejected for the others.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupplierPatch {
    #[serde(default, deserialize_with = "present")]
    pub nombre: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub contacto: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub telefono: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub activo: Option<Option<bool>>,
    #[serde(default, deserialize_with = "present")]
    pub panaderia_id: Option<Option<i64>>,
}

impl SupplierPatch {
    fn into_assignments(self) -> Result<Assignments, ApiError> {
        let mut values = Assignments::new();
        if let Some(name) = not_null("nombre", self.nombre)? {
            values = values.set("nombre", non_blank(name)?);
        }
        for (column, value) in [
            ("contacto", self.contacto),
            ("telefono", self.telefono),
            ("email", self.email),
        ] {
            if let Some(value) = value {
                values = values.set(column, value);
            }
        }
        if let Some(active) = not_null("activo", self.activo)? {
            values = values.set("activo", active);
        }
        // Passed through so the builder reports the reassignment attempt.
        if let Some(tenant) = self.panaderia_id {
            values = values.set(TENANT_COLUMN, tenant);
        }
        Ok(values)
    }
}

/// Distinguishes an explicit `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn not_null<T>(column: &str, value: Option<Option<T>>) -> Result<Option<T>, ApiError> {
    match value {
        Some(None) => Err(ApiError::Validation(format!("{column} cannot be null"))),
        Some(Some(value)) => Ok(Some(value)),
        None => Ok(None),
    }
}

fn non_blank(name: String) -> Result<String, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation("nombre must be a non-empty string".to_string()));
    }
    Ok(name)
}

fn parse_body<T: DeserializeOwned>(body: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(body)
        .map_err(|err| ApiError::Validation(format!("invalid supplier payload: {err}")))
}

async fn load_owned(
    repo: &Repository<'_, Supplier, dyn Store>,
    id: RecordId,
) -> Result<Supplier, ApiError> {
    repo.fetch_by_id_unscoped(id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: Supplier::NAME,
            id,
        })
}

pub async fn list(
    State(state): State<AppState>,
    tenancy: Tenancy,
    session: Session,
    Query(query): Query<SupplierQuery>,
) -> Result<Json<Vec<Supplier>>, ApiError> {
    authorize(&tenancy, &session, Area::Suppliers, false)?;
    let suppliers = repository(&state, &tenancy).list(query.into_filter()).await?;
    Ok(Json(suppliers))
}

pub async fn show(
    State(state): State<AppState>,
    tenancy: Tenancy,
    session: Session,
    Path(id): Path<RecordId>,
) -> Result<Json<Supplier>, ApiError> {
    authorize(&tenancy, &session, Area::Suppliers, false)?;
    let supplier = load_owned(&repository(&state, &tenancy), id).await?;
    Ok(Json(supplier))
}

pub async fn create(
    State(state): State<AppState>,
    tenancy: Tenancy,
    session: Session,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<Supplier>), ApiError> {
    authorize(&tenancy, &session, Area::Suppliers, true)?;
    let values = parse_body::<SupplierInput>(body)?.into_assignments()?;

    let repo = repository(&state, &tenancy);
    let id = repo.create(values).await?;
    let created = repo.get(id).await?.ok_or(ApiError::NotFound {
        entity: Supplier::NAME,
        id,
    })?;
    tracing::info!(id, tenant = %created.tenant_id, principal = %session.principal.id, "supplier created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<AppState>,
    tenancy: Tenancy,
    session: Session,
    Path(id): Path<RecordId>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<Supplier>, ApiError> {
    authorize(&tenancy, &session, Area::Suppliers, true)?;
    let values = parse_body::<SupplierPatch>(body)?.into_assignments()?;
    if values.is_empty() {
        return Err(ApiError::Validation("nothing to update".to_string()));
    }

    let repo = repository(&state, &tenancy);
    load_owned(&repo, id).await?;
    repo.update(Filter::new().eq(ID_COLUMN, id), values).await?;
    let updated = load_owned(&repo, id).await?;
    Ok(Json(updated))
}

pub async fn remove(
    State(state): State<AppState>,
    tenancy: Tenancy,
    session: Session,
    Path(id): Path<RecordId>,
) -> Result<StatusCode, ApiError> {
    authorize(&tenancy, &session, Area::Suppliers, true)?;
    let repo = repository(&state, &tenancy);
    load_owned(&repo, id).await?;
    repo.delete(Filter::new().eq(ID_COLUMN, id)).await?;
    tracing::info!(id, principal = %session.principal.id, "supplier deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hornero_core::query::Value;
    use serde_json::json;

    fn create(body: serde_json::Value) -> Result<Assignments, ApiError> {
        parse_body::<SupplierInput>(body)?.into_assignments()
    }

    fn patch(body: serde_json::Value) -> Result<Assignments, ApiError> {
        parse_body::<SupplierPatch>(body)?.into_assignments()
    }

    #[test]
    fn query_builds_equality_filter() {
        let filter = SupplierQuery {
            activo: Some(true),
            nombre: None,
        }
        .into_filter();
        assert_eq!(filter.predicates().len(), 1);
    }

    #[test]
    fn create_requires_a_name() {
        assert!(matches!(create(json!({"telefono": "555"})), Err(ApiError::Validation(_))));
        assert!(create(json!({"nombre": "  "})).is_err());

        let values = create(json!({"nombre": "Harinas", "activo": false})).unwrap();
        assert_eq!(values.get("activo"), Some(&Value::Bool(false)));
    }

    #[test]
    fn mistyped_and_unknown_columns_are_rejected() {
        for body in [
            json!({"nombre": "Mala", "activo": "si"}),
            json!({"nombre": "Mala", "telefono": 5550101}),
            json!({"nombre": "Mala", "extra": {"a": 1}}),
            json!({"nombre": "Mala", "id": 99}),
            json!(["nombre", "Mala"]),
        ] {
            assert!(matches!(create(body), Err(ApiError::Validation(_))));
        }
        assert!(matches!(patch(json!({"activo": 1})), Err(ApiError::Validation(_))));
    }

    #[test]
    fn patch_nulls_clear_optional_columns_only() {
        let values = patch(json!({"contacto": null})).unwrap();
        assert_eq!(values.get("contacto"), Some(&Value::Null));

        assert!(patch(json!({"nombre": null})).is_err());
        assert!(patch(json!({"activo": null})).is_err());
        assert!(patch(json!({})).unwrap().is_empty());
    }

    #[test]
    fn patch_keeps_tenant_column_for_the_builder() {
        let values = patch(json!({"panaderia_id": 5})).unwrap();
        assert_eq!(values.get(TENANT_COLUMN), Some(&Value::Int(5)));
    }
}
