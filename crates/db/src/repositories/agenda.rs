use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, error, info};

use docket_core::domain::importance::Importance;
use docket_core::domain::item::{
    assignees_key, is_assignees_key, normalize_name, AgendaItem, ItemField, ItemFields,
    UpdateValue,
};
use docket_core::errors::AgendaError;
use docket_core::ordering;

use super::{KeyValueStore, WriteOp};

const FIELD_TIME: &str = "time";
const FIELD_IMPORTANCE: &str = "importance";
const FIELD_DESC: &str = "desc";
const FIELD_DUE_DATE: &str = "due_date";

/// The agenda item store. Each item is a hash keyed by its name plus an
/// optional `<name>:assignees` list.
pub struct AgendaRepository<S> {
    store: S,
}

impl<S: KeyValueStore> AgendaRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn add(&self, fields: ItemFields, assignees: Vec<String>) -> Result<(), AgendaError> {
        self.add_at(fields, assignees, Utc::now()).await
    }

    /// Same as [`add`](Self::add) with an explicit creation time.
    pub async fn add_at(
        &self,
        fields: ItemFields,
        assignees: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Result<(), AgendaError> {
        let name = normalize_name(&fields.name)?;
        let importance = Importance::parse(&fields.importance)?;

        if self.store.exists(&name).await? {
            return Err(AgendaError::AlreadyExists(name));
        }

        let time = created_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let assignee_count = assignees.len();
        self.store
            .write_batch(vec![
                WriteOp::HashSet {
                    key: name.clone(),
                    fields: vec![
                        (FIELD_TIME.to_string(), time),
                        (FIELD_IMPORTANCE.to_string(), importance.to_stored()),
                        (FIELD_DESC.to_string(), fields.desc),
                        (FIELD_DUE_DATE.to_string(), fields.due_date),
                    ],
                },
                WriteOp::ListPush { key: assignees_key(&name), values: assignees },
            ])
            .await?;

        info!(
            event_name = "agenda.store.item_added",
            item = %name,
            importance = importance.level(),
            assignee_count,
            "agenda item added"
        );
        Ok(())
    }

    pub async fn remove(&self, name: &str) -> Result<(), AgendaError> {
        let name = name.trim();
        if !self.item_exists(name).await? {
            return Err(AgendaError::NotFound(name.to_string()));
        }

        self.store
            .write_batch(vec![
                WriteOp::Delete(name.to_string()),
                WriteOp::Delete(assignees_key(name)),
            ])
            .await?;

        info!(event_name = "agenda.store.item_removed", item = %name, "agenda item removed");
        Ok(())
    }

    pub async fn update(
        &self,
        name: &str,
        field: ItemField,
        value: UpdateValue,
    ) -> Result<(), AgendaError> {
        let name = name.trim();
        if !self.item_exists(name).await? {
            return Err(AgendaError::NotFound(name.to_string()));
        }

        match (field, value) {
            (ItemField::Name, UpdateValue::Text(new_name)) => self.rename(name, &new_name).await?,
            (ItemField::Importance, UpdateValue::Text(raw)) => {
                let importance = Importance::parse(&raw)?;
                self.set_field(name, FIELD_IMPORTANCE, importance.to_stored()).await?;
            }
            (ItemField::Desc, UpdateValue::Text(desc)) => {
                self.set_field(name, FIELD_DESC, desc).await?;
            }
            (ItemField::DueDate, UpdateValue::Text(due_date)) => {
                self.set_field(name, FIELD_DUE_DATE, due_date).await?;
            }
            (ItemField::Assignees, value) => {
                let users = match value {
                    UpdateValue::Users(users) => users,
                    UpdateValue::Text(raw) => split_user_ids(&raw),
                };
                let key = assignees_key(name);
                self.store
                    .write_batch(vec![
                        WriteOp::Delete(key.clone()),
                        WriteOp::ListPush { key, values: users },
                    ])
                    .await?;
            }
            (field, UpdateValue::Users(_)) => {
                return Err(AgendaError::InvalidField(field.as_str().to_string()));
            }
        }

        info!(
            event_name = "agenda.store.item_updated",
            item = %name,
            field = field.as_str(),
            "agenda item updated"
        );
        Ok(())
    }

    /// Updates using a field name supplied as text.
    pub async fn update_named_field(
        &self,
        name: &str,
        field: &str,
        value: UpdateValue,
    ) -> Result<(), AgendaError> {
        let field = field.parse::<ItemField>()?;
        self.update(name, field, value).await
    }

    /// Assignee lists share the key space but are never items themselves.
    async fn item_exists(&self, name: &str) -> Result<bool, AgendaError> {
        if is_assignees_key(name) {
            return Ok(false);
        }
        Ok(self.store.exists(name).await?)
    }

    async fn set_field(&self, name: &str, field: &str, value: String) -> Result<(), AgendaError> {
        self.store
            .write_batch(vec![WriteOp::HashSet {
                key: name.to_string(),
                fields: vec![(field.to_string(), value)],
            }])
            .await?;
        Ok(())
    }

    async fn rename(&self, old_name: &str, new_name: &str) -> Result<(), AgendaError> {
        let new_name = normalize_name(new_name)?;
        if new_name == old_name || self.store.exists(&new_name).await? {
            return Err(AgendaError::AlreadyExists(new_name));
        }

        let fields = self.store.hash_get_all(old_name).await?;
        let assignees = self.store.list_range(&assignees_key(old_name)).await?;

        let mut fields: Vec<(String, String)> = fields.into_iter().collect();
        fields.sort();
        self.store
            .write_batch(vec![
                WriteOp::Delete(old_name.to_string()),
                WriteOp::Delete(assignees_key(old_name)),
                WriteOp::HashSet { key: new_name.clone(), fields },
                WriteOp::ListPush { key: assignees_key(&new_name), values: assignees },
            ])
            .await?;

        debug!(
            event_name = "agenda.store.item_renamed",
            from = %old_name,
            to = %new_name,
            "agenda item moved to new key"
        );
        Ok(())
    }

    /// Every stored item. With `sorted` the result is in display order,
    /// otherwise in scan order.
    pub async fn list(&self, sorted: bool) -> Result<Vec<AgendaItem>, AgendaError> {
        let keys = self.store.scan_keys().await?;
        let mut items = Vec::with_capacity(keys.len());

        for key in keys.into_iter().filter(|key| !is_assignees_key(key)) {
            let mut fields = self.store.hash_get_all(&key).await?;
            if fields.is_empty() {
                // removed between scan and read
                continue;
            }

            let raw_importance = fields.remove(FIELD_IMPORTANCE).unwrap_or_default();
            let importance = Importance::from_stored(&raw_importance).map_err(|err| {
                error!(
                    event_name = "agenda.store.invalid_importance",
                    item = %key,
                    stored = %raw_importance,
                    "stored importance outside the supported range"
                );
                err
            })?;
            let assignees = self.store.list_range(&assignees_key(&key)).await?;

            items.push(AgendaItem {
                importance,
                desc: fields.remove(FIELD_DESC).unwrap_or_default(),
                due_date: fields.remove(FIELD_DUE_DATE).unwrap_or_default(),
                time: fields.remove(FIELD_TIME).unwrap_or_default(),
                assignees,
                name: key,
            });
        }

        if sorted {
            ordering::sort_items(&mut items);
        }
        Ok(items)
    }

    pub async fn clear(&self) -> Result<(), AgendaError> {
        let reply = self.store.flush().await?;
        if !reply.starts_with("OK") {
            error!(event_name = "agenda.store.clear_failed", reply = %reply, "flush rejected");
            return Err(AgendaError::Store(format!(
                "agenda could not be cleared, got message: {reply}"
            )));
        }

        info!(event_name = "agenda.store.cleared", "agenda cleared");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), AgendaError> {
        self.store.ping().await.map_err(AgendaError::from)
    }
}

fn split_user_ids(raw: &str) -> Vec<String> {
    raw.split(|ch: char| ch == ',' || ch.is_whitespace())
        .map(|id| id.trim_start_matches("<@").trim_end_matches('>'))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}
