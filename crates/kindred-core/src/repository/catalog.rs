//! Personality and role catalogue repositories.

use kindred_types::error::RepositoryError;
use kindred_types::personality::Personality;
use kindred_types::role::Role;
use uuid::Uuid;

/// Names are unique: `create` returns `RepositoryError::Conflict` on a
/// duplicate name.
pub trait PersonalityRepository: Send + Sync {
    fn create(
        &self,
        personality: &Personality,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Personality>, RepositoryError>> + Send;

    fn get_by_name(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Personality>, RepositoryError>> + Send;

    /// All personalities ordered by name.
    fn list(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Personality>, RepositoryError>> + Send;

    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Same contract as [`PersonalityRepository`], for roles.
pub trait RoleRepository: Send + Sync {
    fn create(
        &self,
        role: &Role,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Role>, RepositoryError>> + Send;

    fn get_by_name(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Role>, RepositoryError>> + Send;

    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Role>, RepositoryError>> + Send;

    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
