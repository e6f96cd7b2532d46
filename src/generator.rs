use chrono::NaiveDate;
use geo::Point;
use tracing::{debug, info};

use crate::boundary::Boundary;
use crate::error::{Error, Result};
use crate::geometry::{offset_between, translate_records};
use crate::model::{AttributeValue, GeneratedDataset, ReferenceDataset};
use crate::rescale::{rescale, AdjustmentFactor};
use crate::temporal::remap;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    // 全レコードのカテゴリ列に書き込む値（作物IDは整数、製品名は文字列）
    pub category_label: AttributeValue,
    pub adjustment: AdjustmentFactor,
    pub target_date: Option<NaiveDate>,
}

impl GenerationOptions {
    pub fn new(category_label: impl Into<AttributeValue>) -> Self {
        Self {
            category_label: category_label.into(),
            adjustment: AdjustmentFactor::IDENTITY,
            target_date: None,
        }
    }

    pub fn with_adjustment(mut self, adjustment: AdjustmentFactor) -> Self {
        self.adjustment = adjustment;
        self
    }

    pub fn with_target_date(mut self, date: Option<NaiveDate>) -> Self {
        self.target_date = date;
        self
    }
}

// 参照データは読むだけで、結果は複製から作る
pub fn generate(
    reference: &ReferenceDataset,
    boundary: Option<&Boundary>,
    options: &GenerationOptions,
) -> Result<GeneratedDataset> {
    let boundary = boundary.ok_or(Error::MissingBoundary)?;
    let anchor = boundary.representative_point()?;
    generate_at(reference, anchor, options)
}

// 参照重心がちょうど anchor に来るように生成する
pub fn generate_at(
    reference: &ReferenceDataset,
    anchor: Point<f64>,
    options: &GenerationOptions,
) -> Result<GeneratedDataset> {
    let schema = &reference.schema;
    let mut records = reference.records.clone();

    for record in records.iter_mut() {
        record.set(&schema.category_field, options.category_label.clone());
    }

    rescale(&mut records, &schema.measured_field, options.adjustment)?;
    remap(&mut records, &schema.timestamp_fields, options.target_date)?;

    let offset = offset_between(schema.reference_centroid, anchor);
    debug!(
        "Offset from reference centroid ({}, {}) to anchor ({}, {}): ({}, {})",
        schema.reference_centroid.x(),
        schema.reference_centroid.y(),
        anchor.x(),
        anchor.y(),
        offset.dx,
        offset.dy
    );
    translate_records(&mut records, offset);

    info!(
        "Generated {} {} records (label={:?}, factor={}, date={:?})",
        records.len(),
        schema.name,
        options.category_label,
        options.adjustment.value(),
        options.target_date
    );

    Ok(GeneratedDataset {
        schema: schema.clone(),
        records,
        anchor,
        offset,
    })
}
