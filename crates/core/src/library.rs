//! The top-level state owner: cards, order hints, collections, filters and
//! the reorder gesture live here and nowhere else. Engines are called with
//! snapshots of this state.

use crate::backup::{self, BackupFile, RestoreMode, RestoreSummary, ValidatedBackup};
use crate::config::AppConfig;
use crate::error::{BackupError, LibraryError};
use crate::filter::{FilterCriteria, SortMode};
use crate::grouping::{self, CardView};
use crate::import::{self, ImportReport, ImportSource, ThumbnailRenderer};
use crate::order_writer::OrderWriter;
use crate::ordering::{self, Direction};
use crate::reorder::{
    DropIndicator, HitTester, Key, Modifiers, MoveIntent, Point, PointerButton, ReorderController,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use storage::models::{normalize_tags, Card, CardId, GroupKey, OrderMap};
use storage::{CardStore, OrderStore, PrefStore, StoreError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub builtin: bool,
}

pub struct Library {
    config: AppConfig,
    cards: Vec<Card>,
    order_map: OrderMap,
    custom_collections: Vec<String>,
    theme: Option<String>,
    criteria: FilterCriteria,
    sort: SortMode,
    reorder: ReorderController,
    notices: Vec<String>,
    card_store: Arc<dyn CardStore>,
    order_store: Arc<dyn OrderStore>,
    pref_store: Arc<dyn PrefStore>,
    writer: OrderWriter,
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

impl Library {
    /// Loads all state from the stores. Must run inside a tokio runtime.
    pub async fn open(
        config: AppConfig,
        card_store: Arc<dyn CardStore>,
        order_store: Arc<dyn OrderStore>,
        pref_store: Arc<dyn PrefStore>,
    ) -> Result<Self, LibraryError> {
        let writer = OrderWriter::spawn(order_store.clone());
        let mut library = Self {
            sort: config.ui.default_sort,
            reorder: ReorderController::new(config.ui.reorder_enabled),
            config,
            cards: Vec::new(),
            order_map: OrderMap::new(),
            custom_collections: Vec::new(),
            theme: None,
            criteria: FilterCriteria::default(),
            notices: Vec::new(),
            card_store,
            order_store,
            pref_store,
            writer,
        };
        library.reload().await?;
        info!(
            cards = library.cards.len(),
            groups = library.order_map.len(),
            collections = library.custom_collections.len(),
            "library opened"
        );
        Ok(library)
    }

    async fn reload(&mut self) -> Result<(), StoreError> {
        let mut cards = self.card_store.list_all().await?;
        cards.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        self.cards = cards;
        self.order_map = self.order_store.load_map().await?;
        self.custom_collections = self.pref_store.load_collections().await?;
        self.theme = self.pref_store.load_theme().await?;
        self.reorder.pointer_cancel();
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.cards.iter().find(|c| &c.id == id)
    }

    pub fn order_map(&self) -> &OrderMap {
        &self.order_map
    }

    pub fn theme(&self) -> Option<&str> {
        self.theme.as_deref()
    }

    pub async fn set_theme(&mut self, theme: Option<&str>) -> Result<(), LibraryError> {
        self.pref_store.save_theme(theme).await?;
        self.theme = theme.map(str::to_string);
        Ok(())
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    // ----- view -----

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn sort(&self) -> SortMode {
        self.sort
    }

    pub fn view(&self) -> CardView<'_> {
        grouping::build_view(
            &self.cards,
            &self.criteria,
            self.sort,
            &self.config.library.builtin_collections,
            &self.custom_collections,
            &self.order_map,
        )
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.criteria.query = query.into();
    }

    pub fn set_tag_filter(&mut self, tag: Option<String>) {
        self.criteria.tag = tag;
    }

    pub fn set_collection_filter(&mut self, collection: Option<String>) {
        self.criteria.collection = collection;
    }

    pub fn set_tier_filter(&mut self, tier: Option<String>) {
        self.criteria.tier = tier;
    }

    pub fn set_favorites_only(&mut self, on: bool) {
        self.criteria.favorites_only = on;
    }

    pub fn clear_filters(&mut self) {
        self.criteria = FilterCriteria::default();
    }

    /// Leaving manual order abandons any drag in progress.
    pub fn set_sort(&mut self, sort: SortMode) {
        self.sort = sort;
        if !sort.is_manual() {
            self.reorder.pointer_cancel();
        }
    }

    /// Every tag in use, for the tag filter picker.
    pub fn all_tags(&self) -> Vec<String> {
        normalize_tags(self.cards.iter().flat_map(|c| c.tags.iter()))
    }

    // ----- card edits -----

    fn index_of(&self, id: &CardId) -> Result<usize, LibraryError> {
        self.cards
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| LibraryError::CardNotFound(id.clone()))
    }

    /// Applies `edit` to a copy, persists it, then commits it in memory.
    async fn edit_card<F>(&mut self, id: &CardId, edit: F) -> Result<(), LibraryError>
    where
        F: FnOnce(&mut Card),
    {
        let idx = self.index_of(id)?;
        let mut updated = self.cards[idx].clone();
        edit(&mut updated);
        updated.touch(Utc::now());
        self.card_store.put(&updated).await?;
        self.cards[idx] = updated;
        Ok(())
    }

    pub async fn rename_card(&mut self, id: &CardId, name: &str) -> Result<(), LibraryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::EmptyName);
        }
        let name = name.to_string();
        self.edit_card(id, move |c| c.name = name).await
    }

    pub async fn set_tags<I, S>(&mut self, id: &CardId, tags: I) -> Result<(), LibraryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags: Vec<String> = tags.into_iter().map(|t| t.as_ref().to_string()).collect();
        self.edit_card(id, move |c| c.set_tags(tags)).await
    }

    pub async fn add_tag(&mut self, id: &CardId, tag: &str) -> Result<(), LibraryError> {
        let idx = self.index_of(id)?;
        let mut tags = self.cards[idx].tags.clone();
        tags.push(tag.to_string());
        self.set_tags(id, tags).await
    }

    pub async fn remove_tag(&mut self, id: &CardId, tag: &str) -> Result<(), LibraryError> {
        let idx = self.index_of(id)?;
        let tags: Vec<String> = self.cards[idx]
            .tags
            .iter()
            .filter(|t| !same_name(t, tag))
            .cloned()
            .collect();
        self.set_tags(id, tags).await
    }

    /// Assigns a collection by name. The name must be known; it is stored
    /// with the registered spelling. `None` or blank unassigns.
    pub async fn set_collection(
        &mut self,
        id: &CardId,
        collection: Option<&str>,
    ) -> Result<(), LibraryError> {
        let resolved = match collection.map(str::trim).filter(|c| !c.is_empty()) {
            Some(name) => Some(
                self.canonical_collection(name)
                    .ok_or_else(|| LibraryError::UnknownCollection(name.to_string()))?,
            ),
            None => None,
        };
        self.edit_card(id, move |c| c.collection = resolved).await
    }

    pub async fn set_tier(&mut self, id: &CardId, tier: Option<&str>) -> Result<(), LibraryError> {
        let resolved = match tier.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => Some(
                self.config
                    .library
                    .tiers
                    .iter()
                    .find(|known| known.as_str() == t)
                    .cloned()
                    .ok_or_else(|| LibraryError::UnknownTier(t.to_string()))?,
            ),
            None => None,
        };
        self.edit_card(id, move |c| c.tier = resolved).await
    }

    pub async fn toggle_favorite(&mut self, id: &CardId) -> Result<bool, LibraryError> {
        self.edit_card(id, |c| c.favorite = !c.favorite).await?;
        Ok(self.cards[self.index_of(id)?].favorite)
    }

    /// Deletes the card and its bytes. Order hints keep the stale id until
    /// the next move; resolution ignores it.
    pub async fn delete_card(&mut self, id: &CardId) -> Result<(), LibraryError> {
        let idx = self.index_of(id)?;
        self.card_store.delete(id).await?;
        self.cards.remove(idx);
        debug!(%id, "card deleted");
        Ok(())
    }

    pub async fn file_bytes(&self, id: &CardId) -> Result<Option<Vec<u8>>, LibraryError> {
        Ok(self.card_store.get_bytes(id).await?)
    }

    // ----- collections -----

    fn canonical_collection(&self, name: &str) -> Option<String> {
        self.config
            .library
            .builtin_collections
            .iter()
            .chain(self.custom_collections.iter())
            .find(|known| same_name(known, name))
            .cloned()
    }

    fn is_builtin(&self, name: &str) -> bool {
        self.config
            .library
            .builtin_collections
            .iter()
            .any(|b| same_name(b, name))
    }

    /// Built-ins in configured order, then customs alphabetically.
    pub fn collections(&self) -> Vec<CollectionInfo> {
        let mut customs = self.custom_collections.clone();
        customs.sort_by(|a, b| crate::filter::compare_names(a, b));
        self.config
            .library
            .builtin_collections
            .iter()
            .map(|name| CollectionInfo {
                name: name.clone(),
                builtin: true,
            })
            .chain(customs.into_iter().map(|name| CollectionInfo {
                name,
                builtin: false,
            }))
            .collect()
    }

    fn check_new_collection_name(&self, name: &str) -> Result<(), LibraryError> {
        if name.is_empty() {
            return Err(LibraryError::EmptyCollectionName);
        }
        if GroupKey::for_collection(Some(name)).as_str() == GroupKey::NONE {
            return Err(LibraryError::ReservedCollectionName(name.to_string()));
        }
        if self.canonical_collection(name).is_some() {
            return Err(LibraryError::DuplicateCollection(name.to_string()));
        }
        Ok(())
    }

    pub async fn create_collection(&mut self, name: &str) -> Result<(), LibraryError> {
        let name = name.trim();
        self.check_new_collection_name(name)?;
        let mut names = self.custom_collections.clone();
        names.push(name.to_string());
        self.pref_store.save_collections(&names).await?;
        self.custom_collections = names;
        Ok(())
    }

    /// Removes a custom collection and clears it from every card that held
    /// it. Returns how many cards were cleared.
    pub async fn delete_collection(&mut self, name: &str) -> Result<usize, LibraryError> {
        if self.is_builtin(name) {
            return Err(LibraryError::BuiltinCollection(name.to_string()));
        }
        let existing = self
            .custom_collections
            .iter()
            .find(|c| same_name(c, name))
            .cloned()
            .ok_or_else(|| LibraryError::UnknownCollection(name.to_string()))?;

        let holders: Vec<CardId> = self
            .cards
            .iter()
            .filter(|c| c.collection.as_deref().is_some_and(|h| same_name(h, &existing)))
            .map(|c| c.id.clone())
            .collect();
        for id in &holders {
            self.edit_card(id, |c| c.collection = None).await?;
        }

        let names: Vec<String> = self
            .custom_collections
            .iter()
            .filter(|c| !same_name(c, &existing))
            .cloned()
            .collect();
        self.pref_store.save_collections(&names).await?;
        self.custom_collections = names;
        info!(collection = %existing, cleared = holders.len(), "collection deleted");
        Ok(holders.len())
    }

    /// Renames a custom collection, carrying card references and the
    /// group's manual order along.
    pub async fn rename_collection(&mut self, from: &str, to: &str) -> Result<(), LibraryError> {
        if self.is_builtin(from) {
            return Err(LibraryError::BuiltinCollection(from.to_string()));
        }
        let existing = self
            .custom_collections
            .iter()
            .find(|c| same_name(c, from))
            .cloned()
            .ok_or_else(|| LibraryError::UnknownCollection(from.to_string()))?;
        let to = to.trim();
        if to.is_empty() {
            return Err(LibraryError::EmptyCollectionName);
        }
        if !same_name(&existing, to) {
            self.check_new_collection_name(to)?;
        }

        let holders: Vec<CardId> = self
            .cards
            .iter()
            .filter(|c| c.collection.as_deref().is_some_and(|h| same_name(h, &existing)))
            .map(|c| c.id.clone())
            .collect();
        for id in &holders {
            let to = to.to_string();
            self.edit_card(id, move |c| c.collection = Some(to)).await?;
        }

        let names: Vec<String> = self
            .custom_collections
            .iter()
            .map(|c| if same_name(c, &existing) { to.to_string() } else { c.clone() })
            .collect();
        self.pref_store.save_collections(&names).await?;
        self.custom_collections = names;

        let old_key = GroupKey::for_collection(Some(&existing));
        let new_key = GroupKey::for_collection(Some(to));
        if old_key != new_key {
            if let Some(list) = self.order_map.remove(&old_key) {
                self.order_map.insert(new_key, list);
                self.writer.enqueue(self.order_map.clone())?;
            }
        }
        info!(from = %existing, to = %to, cards = holders.len(), "collection renamed");
        Ok(())
    }

    // ----- reordering -----

    pub fn reorder_enabled(&self) -> bool {
        self.reorder.enabled()
    }

    pub fn set_reorder_enabled(&mut self, enabled: bool) {
        self.reorder.set_enabled(enabled);
    }

    pub fn reorder(&self) -> &ReorderController {
        &self.reorder
    }

    fn group_members(&self, key: &GroupKey) -> Vec<&Card> {
        self.cards.iter().filter(|c| &c.group_key() == key).collect()
    }

    /// Resolved manual order of one group (ignores active filters).
    pub fn group_order(&self, key: &GroupKey) -> Vec<CardId> {
        let members = self.group_members(key);
        let persisted = self.order_map.get(key).map(Vec::as_slice).unwrap_or(&[]);
        ordering::resolve_ids(&members, persisted)
    }

    fn store_group_order(&mut self, key: GroupKey, list: Vec<CardId>) -> Result<(), LibraryError> {
        self.order_map.insert(key, list);
        self.writer.enqueue(self.order_map.clone())
    }

    /// Drops `dragged` before or after `target`. Cross-group drops, self
    /// drops and unknown cards are ignored. Returns whether order changed.
    pub fn move_card(
        &mut self,
        dragged: &CardId,
        target: &CardId,
        place_before: bool,
    ) -> Result<bool, LibraryError> {
        if dragged == target {
            return Ok(false);
        }
        let (Some(d), Some(t)) = (self.card(dragged), self.card(target)) else {
            return Ok(false);
        };
        let key = d.group_key();
        if key != t.group_key() {
            debug!(%dragged, %target, "cross-group drop ignored");
            return Ok(false);
        }

        let members = self.group_members(&key);
        let persisted = self.order_map.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        let before = ordering::resolve_ids(&members, persisted);
        let list = ordering::move_card(&members, persisted, dragged, target, place_before);
        if list == before {
            return Ok(false);
        }
        self.store_group_order(key, list)?;
        Ok(true)
    }

    /// Keyboard reorder: swaps with the neighbour in the group's resolved
    /// order. Requires reorder mode and manual sort.
    pub fn shift_card(&mut self, id: &CardId, direction: Direction) -> Result<bool, LibraryError> {
        if !self.reorder.enabled() || !self.sort.is_manual() {
            return Ok(false);
        }
        let Some(card) = self.card(id) else {
            return Ok(false);
        };
        let key = card.group_key();
        let members = self.group_members(&key);
        let persisted = self.order_map.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        match ordering::shift_card(&members, persisted, id, direction) {
            Some(list) => {
                self.store_group_order(key, list)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn key_down(
        &mut self,
        focused: &CardId,
        key: Key,
        modifiers: Modifiers,
    ) -> Result<bool, LibraryError> {
        match self.reorder.key_direction(key, modifiers, self.sort) {
            Some(direction) => self.shift_card(focused, direction),
            None => Ok(false),
        }
    }

    pub fn pointer_down(&mut self, id: &CardId, button: PointerButton) -> bool {
        let Some(card) = self.card(id) else {
            return false;
        };
        let key = card.group_key();
        self.reorder.pointer_down(id, &key, button, self.sort)
    }

    pub fn pointer_move(&mut self, point: Point, hits: &dyn HitTester) -> Option<DropIndicator> {
        self.reorder.pointer_move(point, hits)
    }

    /// Finishes a drag, committing the move when a valid target is pending.
    pub fn pointer_up(&mut self) -> Result<bool, LibraryError> {
        match self.reorder.pointer_up() {
            Some(MoveIntent {
                dragged,
                target,
                place_before,
                ..
            }) => self.move_card(&dragged, &target, place_before),
            None => Ok(false),
        }
    }

    pub fn pointer_cancel(&mut self) {
        self.reorder.pointer_cancel();
    }

    /// Waits for queued order saves; surfaces the last failure as a notice
    /// and as the error.
    pub async fn flush(&mut self) -> Result<(), LibraryError> {
        let result = self.writer.flush().await;
        if let Err(e) = &result {
            warn!("order persistence failed: {}", e);
            self.notices.push(e.to_string());
        }
        result
    }

    // ----- import / backup -----

    pub async fn import(
        &mut self,
        sources: Vec<ImportSource>,
        renderer: &dyn ThumbnailRenderer,
    ) -> ImportReport {
        let mut known: HashSet<String> = self
            .cards
            .iter()
            .filter_map(|c| c.content_hash.clone())
            .collect();
        let report = import::import_batch(
            sources,
            renderer,
            self.card_store.as_ref(),
            &self.config.import,
            &mut known,
        )
        .await;
        self.cards.extend(report.imported.iter().cloned());
        self.notices.extend(report.notices.iter().cloned());
        report
    }

    pub async fn export_backup(&self) -> Result<BackupFile, BackupError> {
        backup::export_backup(
            self.card_store.as_ref(),
            self.order_store.as_ref(),
            self.pref_store.as_ref(),
        )
        .await
    }

    /// Writes a validated backup, then reloads every piece of state.
    pub async fn restore_backup(
        &mut self,
        validated: ValidatedBackup,
        mode: RestoreMode,
    ) -> Result<RestoreSummary, BackupError> {
        // Queued order saves must land before the restore overwrites them.
        if let Err(e) = self.writer.flush().await {
            warn!("pending order save failed before restore: {}", e);
        }
        let summary = backup::restore(
            validated,
            mode,
            &self.config.library.builtin_collections,
            self.card_store.as_ref(),
            self.order_store.as_ref(),
            self.pref_store.as_ref(),
        )
        .await?;
        self.reload().await?;
        Ok(summary)
    }
}
