//! Scene registry and running scene sessions.
//!
//! A scene is one of the sub-applications (phone, bedroom, hub, ...). The
//! manager keeps the set of enabled kinds and the sessions currently
//! running; sessions live in memory only and are lost on restart.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use kindred_types::asset::{Asset, AssetType, SaveAssetRequest};
use kindred_types::error::SceneError;
use kindred_types::event::CompanionEvent;
use kindred_types::scene::{CreateSceneRequest, Scene, SceneDefinition, SceneKind, SceneStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::asset::AssetManager;
use crate::event::EventBus;
use crate::repository::Backend;

pub struct SceneManager<B: Backend> {
    assets: AssetManager<B>,
    kinds: RwLock<BTreeSet<SceneKind>>,
    active: RwLock<HashMap<Uuid, Scene>>,
    events: EventBus,
}

impl<B: Backend> SceneManager<B> {
    /// A manager with every scene kind enabled.
    pub fn new(backend: Arc<B>, events: EventBus) -> Self {
        Self::with_kinds(backend, events, SceneKind::ALL)
    }

    pub fn with_kinds(
        backend: Arc<B>,
        events: EventBus,
        kinds: impl IntoIterator<Item = SceneKind>,
    ) -> Self {
        Self {
            assets: AssetManager::new(backend),
            kinds: RwLock::new(kinds.into_iter().collect()),
            active: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub async fn register(&self, kind: SceneKind) -> bool {
        self.kinds.write().await.insert(kind)
    }

    pub async fn unregister(&self, kind: SceneKind) -> bool {
        self.kinds.write().await.remove(&kind)
    }

    pub async fn list_kinds(&self) -> Vec<SceneKind> {
        self.kinds.read().await.iter().copied().collect()
    }

    pub async fn create(&self, request: CreateSceneRequest) -> Result<Scene, SceneError> {
        let name = request.name.trim();
        let name = if name.is_empty() {
            request.kind.to_string()
        } else {
            name.to_string()
        };
        self.start(request.kind, name, None, request.characters, request.config)
            .await
    }

    /// Start a scene from a stored `scene` asset.
    pub async fn load(&self, asset_id: &Uuid) -> Result<Scene, SceneError> {
        let asset = self.assets.load(asset_id, None).await?;
        if asset.asset_type != AssetType::Scene {
            return Err(SceneError::InvalidDefinition(format!(
                "asset {asset_id} is a {} asset",
                asset.asset_type
            )));
        }
        let definition: SceneDefinition = serde_json::from_value(asset.data)
            .map_err(|e| SceneError::InvalidDefinition(e.to_string()))?;

        self.start(
            definition.scene_type,
            definition.name,
            Some(asset.id),
            definition.characters,
            definition.config,
        )
        .await
    }

    /// Persist a scene definition as a `scene` asset.
    pub async fn save_definition(
        &self,
        definition: &SceneDefinition,
        tags: Vec<String>,
    ) -> Result<Asset, SceneError> {
        let data = serde_json::to_value(definition)
            .map_err(|e| SceneError::InvalidDefinition(e.to_string()))?;
        Ok(self
            .assets
            .save(SaveAssetRequest {
                id: None,
                asset_type: AssetType::Scene,
                data,
                metadata: None,
                tags,
            })
            .await?)
    }

    pub async fn get(&self, id: &Uuid) -> Result<Scene, SceneError> {
        self.active
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(SceneError::NotFound)
    }

    pub async fn find_by_name(&self, name: &str) -> Option<Scene> {
        self.active
            .read()
            .await
            .values()
            .find(|s| s.name == name)
            .cloned()
    }

    pub async fn stop(&self, id: &Uuid) -> Result<Scene, SceneError> {
        let mut scene = self
            .active
            .write()
            .await
            .remove(id)
            .ok_or(SceneError::NotFound)?;
        scene.status = SceneStatus::Stopped;
        scene.stopped_at = Some(Utc::now());

        tracing::info!(scene_id = %scene.id, name = %scene.name, "scene stopped");
        self.events.publish(CompanionEvent::SceneStopped { scene_id: scene.id });
        Ok(scene)
    }

    /// Stop every running scene. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let stopped: Vec<Scene> = self.active.write().await.drain().map(|(_, s)| s).collect();
        for scene in &stopped {
            self.events.publish(CompanionEvent::SceneStopped { scene_id: scene.id });
        }
        if !stopped.is_empty() {
            tracing::info!(count = stopped.len(), "all scenes stopped");
        }
        stopped.len()
    }

    /// Running scenes, oldest first.
    pub async fn list_active(&self) -> Vec<Scene> {
        let mut scenes: Vec<Scene> = self.active.read().await.values().cloned().collect();
        scenes.sort_by_key(|s| s.started_at);
        scenes
    }

    async fn start(
        &self,
        kind: SceneKind,
        name: String,
        asset_id: Option<Uuid>,
        characters: Vec<Uuid>,
        config: serde_json::Value,
    ) -> Result<Scene, SceneError> {
        if !self.kinds.read().await.contains(&kind) {
            return Err(SceneError::UnregisteredKind(kind.to_string()));
        }

        let scene = Scene {
            id: Uuid::now_v7(),
            name,
            kind,
            status: SceneStatus::Running,
            asset_id,
            characters,
            config: if config.is_null() { serde_json::json!({}) } else { config },
            started_at: Utc::now(),
            stopped_at: None,
        };
        self.active.write().await.insert(scene.id, scene.clone());

        tracing::info!(scene_id = %scene.id, kind = %kind, name = %scene.name, "scene started");
        self.events.publish(CompanionEvent::SceneStarted {
            scene_id: scene.id,
            kind,
            name: scene.name.clone(),
        });
        Ok(scene)
    }
}
