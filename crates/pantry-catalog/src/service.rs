use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use pantry_store::BlobStore;

use crate::cascade::{CascadeDeleter, DeleteReport};
use crate::config::CatalogConfig;
use crate::contact::{ContactDesk, ContactForm, ContactReceipt};
use crate::error::{CatalogError, CatalogResult};
use crate::guard::ObjectGuard;
use crate::id::RecipeId;
use crate::index::{CatalogIndex, IndexDocument, UpsertOutcome};
use crate::record::RecipeStore;

/// Body of a save-recipe call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveRecipeRequest {
    pub recipe_json: Value,
    pub index_patch: Value,
}

/// Body of a delete-recipe call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteRecipeRequest {
    pub id: String,
    pub delete_images: bool,
}

/// Body of a delete-object call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteObjectRequest {
    pub key: String,
}

/// Result of a successful save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveOutcome {
    pub id: RecipeId,
    pub index: UpsertOutcome,
}

/// Entry point to the catalog: every recipe mutation goes through here so the
/// record store and the index are always updated together.
#[derive(Clone, Debug)]
pub struct CatalogService {
    records: RecipeStore,
    index: CatalogIndex,
    cascade: CascadeDeleter,
    delete_guard: ObjectGuard,
    upload_guard: ObjectGuard,
    contacts: ContactDesk,
}

impl CatalogService {
    pub fn new(store: Arc<dyn BlobStore>, config: &CatalogConfig) -> Self {
        let records = RecipeStore::new(store.clone());
        let index = CatalogIndex::new(store.clone(), config.index.clone());
        let cascade = CascadeDeleter::new(
            store.clone(),
            records.clone(),
            index.clone(),
            config.purge.clone(),
        );
        Self {
            records,
            index,
            cascade,
            delete_guard: ObjectGuard::for_deletes(store.clone()),
            upload_guard: ObjectGuard::for_uploads(store.clone()),
            contacts: ContactDesk::new(store, &config.contact),
        }
    }

    /// Replace the contact desk, e.g. to attach custom notifiers.
    pub fn with_contact_desk(mut self, contacts: ContactDesk) -> Self {
        self.contacts = contacts;
        self
    }

    pub fn upload_guard(&self) -> &ObjectGuard {
        &self.upload_guard
    }

    /// Write the recipe record, then reconcile its index entry.
    ///
    /// The request is fully validated before anything is written: the recipe
    /// needs an `id`, and the index patch must be an object whose `id`, if
    /// present, matches. A patch without an `id` takes the recipe's.
    pub async fn save_recipe(&self, request: SaveRecipeRequest) -> CatalogResult<SaveOutcome> {
        let id = RecipeId::from_document(&request.recipe_json)?;
        let patch = reconcile_patch(&id, request.index_patch)?;

        self.records.save(&request.recipe_json).await?;
        let index = self.index.upsert(patch).await?;
        info!(%id, ?index, "recipe saved");
        Ok(SaveOutcome { id, index })
    }

    /// Remove a recipe, its index entry and optionally its images.
    pub async fn delete_recipe(
        &self,
        request: &DeleteRecipeRequest,
    ) -> CatalogResult<(RecipeId, DeleteReport)> {
        let id = RecipeId::parse(&request.id)?;
        let report = self.cascade.delete_recipe(&id, request.delete_images).await?;
        Ok((id, report))
    }

    /// Delete one object under the recipe namespaces.
    pub async fn delete_object(&self, request: &DeleteObjectRequest) -> CatalogResult<()> {
        if request.key.is_empty() {
            return Err(CatalogError::validation("missing key"));
        }
        self.delete_guard.delete_object(&request.key).await
    }

    pub async fn submit_contact(&self, form: &ContactForm) -> CatalogResult<ContactReceipt> {
        self.contacts.submit(form).await
    }

    /// The current catalog index.
    pub async fn index(&self) -> CatalogResult<IndexDocument> {
        self.index.load().await
    }

    /// The stored record for `id`, if any.
    pub async fn recipe(&self, id: &str) -> CatalogResult<Option<Value>> {
        let id = RecipeId::parse(id)?;
        match self.records.read_or(&id, Value::Null).await? {
            Value::Null => Ok(None),
            record => Ok(Some(record)),
        }
    }
}

fn reconcile_patch(id: &RecipeId, patch: Value) -> CatalogResult<Value> {
    let mut patch = match patch {
        Value::Object(map) => map,
        Value::Null => return Err(CatalogError::validation("missing indexPatch")),
        _ => return Err(CatalogError::validation("indexPatch must be an object")),
    };
    match patch.get("id") {
        None | Some(Value::Null) => {
            patch.insert("id".into(), Value::String(id.to_string()));
        }
        Some(Value::String(patch_id)) if patch_id == id.as_str() => {}
        Some(other) => {
            return Err(CatalogError::validation(format!(
                "indexPatch id {other} does not match recipe id {id:?}",
                id = id.as_str()
            )));
        }
    }
    Ok(Value::Object(patch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantry_store::keys::{recipe_key, INDEX_KEY};
    use pantry_store::{read_json_or, InMemoryBlobStore};
    use serde_json::json;

    fn service() -> (Arc<InMemoryBlobStore>, CatalogService) {
        let mem = Arc::new(InMemoryBlobStore::new());
        let service = CatalogService::new(mem.clone(), &CatalogConfig::default());
        (mem, service)
    }

    fn save(recipe: Value, patch: Value) -> SaveRecipeRequest {
        SaveRecipeRequest {
            recipe_json: recipe,
            index_patch: patch,
        }
    }

    async fn stored_index(mem: &InMemoryBlobStore) -> Value {
        read_json_or(mem, INDEX_KEY, Value::Null).await.unwrap()
    }

    #[tokio::test]
    async fn save_update_delete_scenario() {
        let (mem, service) = service();

        let first = service
            .save_recipe(save(json!({"id": "r1", "steps": 3}), json!({"id": "r1", "title": "Soup"})))
            .await
            .unwrap();
        assert_eq!(first.id.as_str(), "r1");
        assert_eq!(first.index, UpsertOutcome::Inserted { position: 0 });
        assert_eq!(stored_index(&mem).await, json!([{"id": "r1", "title": "Soup"}]));

        let second = service
            .save_recipe(save(json!({"id": "r1", "steps": 4}), json!({"id": "r1", "title": "Stew"})))
            .await
            .unwrap();
        assert_eq!(second.index, UpsertOutcome::Replaced { position: 0 });
        assert_eq!(stored_index(&mem).await, json!([{"id": "r1", "title": "Stew"}]));

        service
            .delete_recipe(&DeleteRecipeRequest {
                id: "r1".into(),
                delete_images: false,
            })
            .await
            .unwrap();
        assert_eq!(stored_index(&mem).await, json!([]));
        assert!(!mem.exists(&recipe_key("r1")).await.unwrap());
    }

    #[tokio::test]
    async fn update_keeps_position_among_others() {
        let (mem, service) = service();
        for id in ["a", "b", "c"] {
            service
                .save_recipe(save(json!({"id": id}), json!({"id": id, "v": 1})))
                .await
                .unwrap();
        }
        service
            .save_recipe(save(json!({"id": "b"}), json!({"id": "b", "v": 2})))
            .await
            .unwrap();
        assert_eq!(
            stored_index(&mem).await,
            json!([{"id": "a", "v": 1}, {"id": "b", "v": 2}, {"id": "c", "v": 1}])
        );
    }

    #[tokio::test]
    async fn missing_recipe_id_writes_nothing() {
        let (mem, service) = service();
        let err = service
            .save_recipe(save(json!({"title": "Soup"}), json!({"title": "Soup"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "missing id");
        assert!(mem.ops().is_empty());
    }

    #[tokio::test]
    async fn patch_without_id_takes_recipe_id() {
        let (mem, service) = service();
        service
            .save_recipe(save(json!({"id": "r9"}), json!({"title": "Pie"})))
            .await
            .unwrap();
        assert_eq!(stored_index(&mem).await, json!([{"id": "r9", "title": "Pie"}]));
    }

    #[tokio::test]
    async fn mismatched_patch_is_rejected_before_writing() {
        let (mem, service) = service();
        let err = service
            .save_recipe(save(json!({"id": "r1"}), json!({"id": "r2"})))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));

        let err = service
            .save_recipe(save(json!({"id": "r1"}), Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "missing indexPatch");
        assert!(mem.ops().is_empty());
    }

    #[tokio::test]
    async fn delete_requires_id() {
        let (mem, service) = service();
        let err = service
            .delete_recipe(&DeleteRecipeRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "missing id");
        assert!(mem.ops().is_empty());
    }

    #[tokio::test]
    async fn delete_object_guarded() {
        let (mem, service) = service();
        let err = service
            .delete_object(&DeleteObjectRequest {
                key: "secrets/config.json".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::KeyNotAllowed(_)));
        assert!(mem.ops().is_empty());

        service
            .delete_object(&DeleteObjectRequest {
                key: "images/recipes/42/a.jpg".into(),
            })
            .await
            .unwrap();

        let err = service
            .delete_object(&DeleteObjectRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "missing key");
    }

    #[tokio::test]
    async fn recipe_lookup() {
        let (_mem, service) = service();
        assert!(service.recipe("r1").await.unwrap().is_none());
        service
            .save_recipe(save(json!({"id": "r1", "x": 1}), json!({})))
            .await
            .unwrap();
        assert_eq!(service.recipe("r1").await.unwrap(), Some(json!({"id": "r1", "x": 1})));
        assert_eq!(service.index().await.unwrap().len(), 1);
    }

    #[test]
    fn request_wire_format() {
        let req: DeleteRecipeRequest =
            serde_json::from_value(json!({"id": "r1", "deleteImages": true})).unwrap();
        assert!(req.delete_images);
        let req: DeleteRecipeRequest = serde_json::from_value(json!({"id": "r1"})).unwrap();
        assert!(!req.delete_images);
        let req: SaveRecipeRequest = serde_json::from_value(json!({
            "recipeJson": {"id": "r1"},
            "indexPatch": {"id": "r1"}
        }))
        .unwrap();
        assert_eq!(req.recipe_json["id"], "r1");
    }
}
