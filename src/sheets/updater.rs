//! Partial updates of existing Creative rows.

use std::sync::Arc;
use tracing::{debug, info};

use super::a1;
use super::client::{SheetsClient, ValueInput};
use super::records::{link_tag, CreativePatch};
use super::schema::{CreativeField, SheetSchema};
use super::writer::LedgerError;

pub struct RowUpdater {
    client: Arc<dyn SheetsClient>,
    schema: Arc<SheetSchema>,
    sheet: String,
}

impl RowUpdater {
    pub fn new(client: Arc<dyn SheetsClient>, schema: Arc<SheetSchema>, sheet: &str) -> Self {
        Self {
            client,
            schema,
            sheet: sheet.to_string(),
        }
    }

    /// Merges `patch` into row `row_index` and rewrites the editable span in
    /// one RAW request. ID, preview and filename are never touched; the link
    /// tag is rebuilt from `id` and the merged type and hypothesis.
    pub async fn update_creative(
        &self,
        row_index: u32,
        id: u64,
        patch: &CreativePatch,
    ) -> Result<(), LedgerError> {
        if row_index < 2 {
            return Err(LedgerError::InvalidRow(row_index));
        }
        let map = &self.schema.creative;
        let (first, last) = map
            .mutable_span()
            .ok_or(LedgerError::NoMutableColumns(self.schema.revision))?;

        let existing = self
            .client
            .read_range(&a1::row_range(&self.sheet, 1, map.width(), row_index))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut merged: Vec<String> = (first..=last)
            .map(|position| {
                existing
                    .get(position as usize - 1)
                    .cloned()
                    .unwrap_or_default()
            })
            .collect();
        let slot = |position: u32| (position - first) as usize;

        for (field, value) in patch.cells() {
            match map.position(field) {
                Some(position) if position >= first && position <= last => {
                    merged[slot(position)] = value;
                }
                _ => debug!("Ignoring {:?}, not mapped in revision {}", field, self.schema.revision),
            }
        }

        let current = |field| {
            map.position(field)
                .filter(|position| *position >= first && *position <= last)
                .map(|position| merged[slot(position)].clone())
                .unwrap_or_default()
        };
        let link = link_tag(
            id,
            &current(CreativeField::Type),
            &current(CreativeField::Hypothesis),
        );
        if let Some(position) = map.position(CreativeField::Link) {
            merged[slot(position)] = link;
        }

        self.client
            .update_range(
                &a1::row_range(&self.sheet, first, last, row_index),
                vec![merged],
                ValueInput::Raw,
            )
            .await?;
        info!("Creative {} updated at row {}", id, row_index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::options::{MainTone, Offer, Style};
    use crate::sheets::memory::{InMemorySpreadsheet, OperationKind};
    use crate::sheets::schema::SchemaRevision;

    const ROW: [&str; 14] = [
        "7",
        "=IMAGE(\"https://x\")",
        "V_id=7;type=static;NameHypoth=city",
        "static",
        "city",
        "not AI",
        "Real",
        "bright",
        "city",
        "Learn maths",
        "через выгоду",
        "курс математики",
        "бесплатный урок",
        "banner.png",
    ];

    fn setup(revision: SchemaRevision) -> (Arc<InMemorySpreadsheet>, RowUpdater) {
        let header = vec!["V_ID"];
        let store = Arc::new(
            InMemorySpreadsheet::new().with_rows("Creative", vec![header, ROW.to_vec()]),
        );
        let updater = RowUpdater::new(
            store.clone(),
            Arc::new(SheetSchema::for_revision(revision).unwrap()),
            "Creative",
        );
        (store, updater)
    }

    #[tokio::test]
    async fn test_update_preserves_untouched_fields() {
        let (store, updater) = setup(SchemaRevision::Marketing);
        let patch = CreativePatch {
            style: Some(Style::ThreeD),
            ..Default::default()
        };
        updater.update_creative(2, 7, &patch).await.unwrap();

        let row = &store.rows("Creative")[1];
        let mut expected: Vec<String> = ROW.iter().map(|c| c.to_string()).collect();
        expected[6] = "3D".to_string();
        assert_eq!(row, &expected);

        let write = store
            .operations()
            .into_iter()
            .find(|op| op.kind == OperationKind::Update)
            .unwrap();
        assert_eq!(write.range, "Creative!C2:M2");
        assert_eq!(write.input, Some(ValueInput::Raw));
    }

    #[tokio::test]
    async fn test_link_tag_follows_merged_hypothesis() {
        let (store, updater) = setup(SchemaRevision::Marketing);
        let patch = CreativePatch {
            hypothesis: Some("paper".to_string()),
            main_tone: Some(MainTone::Dark),
            offer: Some(Offer::Webinar),
            ..Default::default()
        };
        updater.update_creative(2, 7, &patch).await.unwrap();
        assert_eq!(
            store.cell("Creative", 2, 3),
            "V_id=7;type=static;NameHypoth=paper"
        );
        assert_eq!(store.cell("Creative", 2, 8), "dark");
        assert_eq!(store.cell("Creative", 2, 13), "вебинар");
        assert_eq!(store.cell("Creative", 2, 1), "7");
        assert_eq!(store.cell("Creative", 2, 14), "banner.png");
    }

    #[tokio::test]
    async fn test_legacy_revision_ignores_marketing_fields() {
        let store = Arc::new(InMemorySpreadsheet::new().with_rows(
            "Creative",
            vec![
                vec!["V_ID"],
                vec!["3", "old", "static", "city", "not AI", "Real", "bright", "city", "a.png"],
            ],
        ));
        let updater = RowUpdater::new(
            store.clone(),
            Arc::new(SheetSchema::for_revision(SchemaRevision::Legacy).unwrap()),
            "Creative",
        );
        let patch = CreativePatch {
            header_text: Some("ignored".to_string()),
            style: Some(Style::Cartoon),
            ..Default::default()
        };
        updater.update_creative(2, 3, &patch).await.unwrap();
        assert_eq!(
            store.rows("Creative")[1],
            vec!["3", "V_id=3;type=static;NameHypoth=city", "static", "city", "not AI", "Cartoon", "bright", "city", "a.png"]
        );
    }

    #[tokio::test]
    async fn test_short_row_reads_missing_cells_as_blank() {
        let store = Arc::new(
            InMemorySpreadsheet::new().with_rows("Creative", vec![vec!["V_ID"], vec!["9"]]),
        );
        let updater = RowUpdater::new(
            store.clone(),
            Arc::new(SheetSchema::for_revision(SchemaRevision::Marketing).unwrap()),
            "Creative",
        );
        updater
            .update_creative(2, 9, &CreativePatch::default())
            .await
            .unwrap();
        assert_eq!(store.cell("Creative", 2, 3), "V_id=9;type=;NameHypoth=");
        assert_eq!(store.cell("Creative", 2, 4), "");
    }

    #[tokio::test]
    async fn test_header_row_is_rejected() {
        let (store, updater) = setup(SchemaRevision::Marketing);
        for row in [0, 1] {
            let result = updater.update_creative(row, 7, &CreativePatch::default()).await;
            assert!(matches!(result, Err(LedgerError::InvalidRow(r)) if r == row));
        }
        assert!(store.operations().is_empty());
    }
}
