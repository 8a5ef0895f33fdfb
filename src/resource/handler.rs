//! Generic CRUD handler
//!
//! Every resource type implements [`ResourceKind`], the capability set
//! {Encode, Decode, Get, Create, Update, Delete, List}. [`CrudHandler`]
//! turns any kind into the Terraform lifecycle: Create, Read, Update,
//! Delete and passthrough import, reporting failures as [`Diagnostics`].

use super::data::ResourceData;
use super::diag::Diagnostics;
use super::retry::RetryPolicy;
use super::schema::Schema;
use crate::download::{InterventionInfo, Resource};
use anyhow::{Context, Result};
use futures::future::{FutureExt, LocalBoxFuture};
use tokio_util::sync::CancellationToken;

/// Settings for delete operations that wait on dependent resources
#[derive(Debug, Clone, Default)]
pub struct DeleteContext {
    pub retry: RetryPolicy,
    pub cancel: CancellationToken,
}

/// Capabilities of one resource type
#[allow(async_fn_in_trait)]
pub trait ResourceKind {
    /// Typed API payload
    type Object;

    /// Terraform type name, e.g. `dynatrace_credentials`
    fn type_name(&self) -> &str;

    /// Folder used when downloading objects of this type
    fn folder(&self) -> &str;

    fn schema(&self) -> Schema;

    /// Resource data -> typed object
    fn decode(&self, data: &ResourceData) -> Result<Self::Object>;

    /// Typed object -> resource data
    fn encode(&self, object: &Self::Object) -> Result<ResourceData>;

    fn set_id(&self, object: &mut Self::Object, id: Option<String>);

    fn display_name(&self, object: &Self::Object) -> String;

    /// Set when downloaded objects of this type may need manual work
    fn intervention(&self) -> Option<InterventionInfo> {
        None
    }

    fn requires_intervention(&self, _object: &Self::Object) -> bool {
        false
    }

    async fn get(&self, id: &str) -> Result<Self::Object>;

    /// Create the object, returning its new ID
    async fn create(&self, object: &Self::Object) -> Result<String>;

    async fn update(&self, id: &str, object: &Self::Object) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// IDs of every existing object
    async fn list_ids(&self) -> Result<Vec<String>>;

    /// Delete step of the lifecycle, overridden by kinds with dependents
    async fn delete_resource(&self, data: &ResourceData, _ctx: &DeleteContext) -> Result<()> {
        let id = data.id().context("resource has no id")?;
        self.delete(id).await
    }
}

/// How an existing object is brought under management
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importer {
    /// The remote ID becomes the Terraform ID unchanged
    Passthrough,
}

impl Importer {
    pub fn import(&self, id: &str) -> ResourceData {
        match self {
            Importer::Passthrough => {
                let mut data = ResourceData::new();
                data.set_id(id);
                data
            }
        }
    }
}

/// Lifecycle handler for one kind
pub struct CrudHandler<K> {
    kind: K,
    ctx: DeleteContext,
}

impl<K: ResourceKind> CrudHandler<K> {
    pub fn new(kind: K, ctx: DeleteContext) -> Self {
        Self { kind, ctx }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub async fn create(&self, data: &mut ResourceData) -> Diagnostics {
        Diagnostics::from_result(self.try_create(data).await)
    }

    pub async fn read(&self, data: &mut ResourceData) -> Diagnostics {
        Diagnostics::from_result(self.try_read(data).await)
    }

    pub async fn update(&self, data: &mut ResourceData) -> Diagnostics {
        Diagnostics::from_result(self.try_update(data).await)
    }

    pub async fn delete(&self, data: &mut ResourceData) -> Diagnostics {
        Diagnostics::from_result(self.try_delete(data).await)
    }

    async fn try_create(&self, data: &mut ResourceData) -> Result<()> {
        let schema = self.kind.schema();
        tracing::info!("create {}", self.kind.type_name());
        tracing::debug!("config: {:?}", schema.redacted(data).attributes());

        schema
            .validate(data)
            .with_context(|| format!("invalid {} configuration", self.kind.type_name()))?;
        let mut object = self.kind.decode(data)?;
        self.kind.set_id(&mut object, None);

        let id = self
            .kind
            .create(&object)
            .await
            .with_context(|| format!("creating {}", self.kind.type_name()))?;
        tracing::info!("created {} {}", self.kind.type_name(), id);

        data.set_id(id);
        self.try_read(data).await
    }

    async fn try_read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data
            .id()
            .context("resource has no id")?
            .to_string();
        tracing::debug!("read {} {}", self.kind.type_name(), id);

        let object = self
            .kind
            .get(&id)
            .await
            .with_context(|| format!("reading {} {}", self.kind.type_name(), id))?;
        let encoded = self.kind.encode(&object)?;
        data.merge(encoded);
        Ok(())
    }

    async fn try_update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data
            .id()
            .context("resource has no id")?
            .to_string();
        tracing::info!("update {} {}", self.kind.type_name(), id);

        self.kind
            .schema()
            .validate(data)
            .with_context(|| format!("invalid {} configuration", self.kind.type_name()))?;
        let mut object = self.kind.decode(data)?;
        self.kind.set_id(&mut object, Some(id.clone()));

        self.kind
            .update(&id, &object)
            .await
            .with_context(|| format!("updating {} {}", self.kind.type_name(), id))?;
        self.try_read(data).await
    }

    async fn try_delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.id().unwrap_or_default().to_string();
        tracing::info!("delete {} {}", self.kind.type_name(), id);

        self.kind
            .delete_resource(data, &self.ctx)
            .await
            .with_context(|| format!("deleting {} {}", self.kind.type_name(), id))?;
        data.clear_id();
        Ok(())
    }

    /// Fetch every object of this kind as a downloadable resource
    pub async fn export(&self) -> Result<Vec<Resource>> {
        let ids = self
            .kind
            .list_ids()
            .await
            .with_context(|| format!("listing {}", self.kind.type_name()))?;
        tracing::info!("downloading {} {}", ids.len(), self.kind.type_name());

        let mut resources = Vec::with_capacity(ids.len());
        for id in ids {
            let object = self
                .kind
                .get(&id)
                .await
                .with_context(|| format!("reading {} {}", self.kind.type_name(), id))?;
            let mut rest_object = self.kind.encode(&object)?;
            rest_object.set_id(id.clone());

            resources.push(Resource {
                name: self.kind.display_name(&object),
                id,
                req_inter: self.kind.requires_intervention(&object),
                rest_object,
            });
        }

        Ok(resources)
    }
}

/// Object-safe view of a [`CrudHandler`], used by the provider registry
pub trait ResourceHandler {
    fn type_name(&self) -> &str;
    fn folder(&self) -> &str;
    fn schema(&self) -> Schema;
    fn intervention(&self) -> Option<InterventionInfo>;
    fn create<'a>(&'a self, data: &'a mut ResourceData) -> LocalBoxFuture<'a, Diagnostics>;
    fn read<'a>(&'a self, data: &'a mut ResourceData) -> LocalBoxFuture<'a, Diagnostics>;
    fn update<'a>(&'a self, data: &'a mut ResourceData) -> LocalBoxFuture<'a, Diagnostics>;
    fn delete<'a>(&'a self, data: &'a mut ResourceData) -> LocalBoxFuture<'a, Diagnostics>;
    fn export(&self) -> LocalBoxFuture<'_, Result<Vec<Resource>>>;
}

impl<K: ResourceKind + 'static> ResourceHandler for CrudHandler<K> {
    fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    fn folder(&self) -> &str {
        self.kind.folder()
    }

    fn schema(&self) -> Schema {
        self.kind.schema()
    }

    fn intervention(&self) -> Option<InterventionInfo> {
        self.kind.intervention()
    }

    fn create<'a>(&'a self, data: &'a mut ResourceData) -> LocalBoxFuture<'a, Diagnostics> {
        CrudHandler::create(self, data).boxed_local()
    }

    fn read<'a>(&'a self, data: &'a mut ResourceData) -> LocalBoxFuture<'a, Diagnostics> {
        CrudHandler::read(self, data).boxed_local()
    }

    fn update<'a>(&'a self, data: &'a mut ResourceData) -> LocalBoxFuture<'a, Diagnostics> {
        CrudHandler::update(self, data).boxed_local()
    }

    fn delete<'a>(&'a self, data: &'a mut ResourceData) -> LocalBoxFuture<'a, Diagnostics> {
        CrudHandler::delete(self, data).boxed_local()
    }

    fn export(&self) -> LocalBoxFuture<'_, Result<Vec<Resource>>> {
        CrudHandler::export(self).boxed_local()
    }
}
