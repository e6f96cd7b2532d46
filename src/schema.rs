use std::fmt;
use std::str::FromStr;

use geo::Point;

// 参照データセットごとの設定。参照重心は固定値で、レコードから再計算しない
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSchema {
    pub name: String,
    pub measured_field: String,
    pub category_field: String,
    pub timestamp_fields: Vec<String>,
    pub reference_centroid: Point<f64>,
    pub output_stem: String,
    pub archive_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Yield,
    Application,
}

impl DatasetKind {
    pub fn schema(self) -> DatasetSchema {
        match self {
            DatasetKind::Yield => DatasetSchema {
                name: "yield".to_string(),
                measured_field: "WetMass".to_string(),
                category_field: "Crop".to_string(),
                timestamp_fields: vec!["Time".to_string(), "IsoTime".to_string()],
                reference_centroid: Point::new(116.9200525150003, -30.65501315962107),
                output_stem: "new_yield".to_string(),
                archive_name: "Yield_Shapefile.zip".to_string(),
            },
            DatasetKind::Application => DatasetSchema {
                name: "application".to_string(),
                measured_field: "AppliedRate".to_string(),
                category_field: "Product".to_string(),
                timestamp_fields: vec!["Time".to_string(), "IsoTime".to_string()],
                reference_centroid: Point::new(-97.85271468657078, 39.83161673804731),
                output_stem: "Application".to_string(),
                archive_name: "Application_Shapefile.zip".to_string(),
            },
        }
    }

    pub fn data_dir_name(self) -> &'static str {
        match self {
            DatasetKind::Yield => "yield",
            DatasetKind::Application => "application",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.data_dir_name())
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yield" => Ok(DatasetKind::Yield),
            "application" | "applied" | "as-applied" => Ok(DatasetKind::Application),
            other => Err(format!("unknown dataset kind: {}", other)),
        }
    }
}

// 作物名とカタログID（Oats と Wheat, Hard Red Winter は同じ 11）
pub const CROPS: &[(&str, u32)] = &[
    ("Barley", 2),
    ("Canola", 5),
    ("Corn", 173),
    ("Lentils", 8),
    ("Oats", 11),
    ("Soybeans", 174),
    ("Sugarcane", 133),
    ("Wheat, Hard Red Winter", 11),
];

pub fn crop_id(name: &str) -> Option<u32> {
    CROPS
        .iter()
        .find(|(crop, _)| crop.eq_ignore_ascii_case(name))
        .map(|(_, id)| *id)
}

// 作物ごとの既定の調整率（%）
pub fn default_adjustment_percent(crop: &str) -> i32 {
    match crop {
        "Corn" => 750,
        "Soybeans" => 255,
        _ => 0,
    }
}
