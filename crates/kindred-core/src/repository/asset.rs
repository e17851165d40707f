//! Asset repository trait definition.

use kindred_types::asset::{
    Asset, AssetDependency, AssetSearch, AssetStats, AssetType, AssetVersion,
};
use kindred_types::error::RepositoryError;
use uuid::Uuid;

/// Storage for versioned assets, their tags, dependency edges and history.
pub trait AssetRepository: Send + Sync {
    /// Insert a new asset (version 1) with its tags.
    fn insert(
        &self,
        asset: &Asset,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Archive `previous` into the version history, then overwrite the
    /// live row and rewrite its tags from `asset`. Runs in one transaction.
    fn replace(
        &self,
        previous: &Asset,
        asset: &Asset,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Asset>, RepositoryError>> + Send;

    fn get_version(
        &self,
        id: &Uuid,
        version: u32,
    ) -> impl std::future::Future<Output = Result<Option<AssetVersion>, RepositoryError>> + Send;

    /// Delete an asset with its tags, history and every edge touching it.
    fn delete(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Newest first.
    fn search(
        &self,
        query: &AssetSearch,
    ) -> impl std::future::Future<Output = Result<Vec<Asset>, RepositoryError>> + Send;

    /// Returns false when the tag was already present.
    fn add_tag(
        &self,
        id: &Uuid,
        tag: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Returns false when the tag was not present.
    fn remove_tag(
        &self,
        id: &Uuid,
        tag: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Insert or update the edge `source -> target`.
    fn upsert_dependency(
        &self,
        dependency: &AssetDependency,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Edges leaving `source_id`.
    fn dependencies_of(
        &self,
        source_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<AssetDependency>, RepositoryError>> + Send;

    /// Edges pointing at `target_id`.
    fn dependents_of(
        &self,
        target_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<AssetDependency>, RepositoryError>> + Send;

    /// Assets no other asset depends on.
    fn orphans(
        &self,
        asset_type: Option<AssetType>,
    ) -> impl std::future::Future<Output = Result<Vec<Asset>, RepositoryError>> + Send;

    fn stats(&self) -> impl std::future::Future<Output = Result<AssetStats, RepositoryError>> + Send;
}
