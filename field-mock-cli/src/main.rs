use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use clap::Parser;
use field_mock::parser::BoundaryFormat;
use field_mock::schema::{default_adjustment_percent, CROPS};
use field_mock::{
    generate, load_boundary_file, resolve, write_archive, AdjustmentFactor, AttributeValue,
    DatasetKind, Feature, GenerationOptions, OutputFormat, ReferenceDataset,
};
use rayon::ThreadPoolBuilder;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 圃場境界ファイル（GeoJSON / KML / ZIP / SHP）、またはディレクトリ
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// 出力ディレクトリ
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// 手描きの境界として全ての入力に結合するファイル
    #[arg(long, value_name = "FILE")]
    drawn: Vec<PathBuf>,

    /// 生成するデータの種類（yield / application）
    #[arg(short, long, default_value = "yield")]
    kind: DatasetKind,

    /// 作物名（yield のみ）
    #[arg(long, conflicts_with = "label")]
    crop: Option<String>,

    /// カテゴリ列に書き込む値（application では製品名として必須）
    #[arg(long)]
    label: Option<String>,

    /// 測定値の調整率（%）
    #[arg(long, allow_negative_numbers = true, value_parser = clap::value_parser!(i32).range(-200..=850))]
    adjust: Option<i32>,

    /// タイムスタンプの日付を置き換える日付（YYYY-MM-DD）
    #[arg(long)]
    date: Option<NaiveDate>,

    /// 参照データセットのディレクトリ（デフォルト: data/<kind>）
    #[arg(long, value_name = "DIR")]
    reference_dir: Option<PathBuf>,

    /// 出力形式（geojson / shapefile）
    #[arg(short, long, default_value = "geojson")]
    format: OutputFormat,

    /// 並列処理スレッド数（デフォルト: CPUコア数）
    #[arg(short, long)]
    threads: Option<usize>,
}

/// 全ての境界ファイルで共有する実行設定
struct Run {
    reference: ReferenceDataset,
    options: GenerationOptions,
    drawn: Vec<Feature>,
    format: OutputFormat,
    output: PathBuf,
}

fn main() -> Result<()> {
    // ログの初期化
    tracing_subscriber::fmt::init();

    // CLI引数の解析
    let args = Args::parse();

    // 処理開始時間を記録
    let start_time = std::time::Instant::now();

    // スレッドプールの設定
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new().num_threads(threads).build_global()?;
    }

    // 出力ディレクトリの作成
    fs::create_dir_all(&args.output)?;

    let run = prepare_run(&args)?;

    // 入力パスの処理
    if args.input.is_file() {
        let prefix = args
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("field");
        process_file(&args.input, prefix, &run)?;
    } else if args.input.is_dir() {
        info!("Processing directory: {:?}", args.input);
        process_directory(&args.input, &run)?;
    } else {
        error!("Invalid input path: {:?}", args.input);
        anyhow::bail!("Input path must be a file or directory");
    }

    // 処理時間を表示
    let elapsed = start_time.elapsed();
    info!("Total processing time: {:?}", elapsed);

    Ok(())
}

fn prepare_run(args: &Args) -> Result<Run> {
    let (label, default_percent) =
        category_label(args.kind, args.crop.as_deref(), args.label.as_deref())?;

    // 参照データセットは一度だけ読み込み、読み取り専用で共有する
    let reference_dir = args
        .reference_dir
        .clone()
        .unwrap_or_else(|| Path::new("data").join(args.kind.data_dir_name()));
    let reference = ReferenceDataset::load(&reference_dir, args.kind.schema())?;

    let percent = args.adjust.unwrap_or(default_percent);
    let adjustment = AdjustmentFactor::from_percent(f64::from(percent))?;
    info!(
        "Kind: {}, label: {:?}, adjustment: {}% (factor {})",
        args.kind,
        label,
        percent,
        adjustment.value()
    );

    let options = GenerationOptions::new(label)
        .with_adjustment(adjustment)
        .with_target_date(args.date);

    // 手描き境界の読み込み
    let mut drawn = Vec::new();
    for path in &args.drawn {
        let collection = load_boundary_file(path)?;
        info!("Drawn features from {:?}: {}", path, collection.features.len());
        drawn.extend(collection.features);
    }

    Ok(Run {
        reference,
        options,
        drawn,
        format: args.format,
        output: args.output.clone(),
    })
}

/// カテゴリ列の値と、その既定の調整率を決める
fn category_label(
    kind: DatasetKind,
    crop: Option<&str>,
    label: Option<&str>,
) -> Result<(AttributeValue, i32)> {
    if let Some(label) = label {
        if label.trim().is_empty() {
            bail!("--label must not be empty");
        }
        return Ok((AttributeValue::from(label), 0));
    }

    match kind {
        DatasetKind::Yield => {
            // 作物が未指定の場合は一覧の先頭を使う
            let requested = crop.unwrap_or(CROPS[0].0);
            let (name, id) = CROPS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(requested))
                .copied()
                .ok_or_else(|| {
                    let known: Vec<&str> = CROPS.iter().map(|(name, _)| *name).collect();
                    anyhow!("Unknown crop {:?}; expected one of: {}", requested, known.join(", "))
                })?;
            // 作物IDは数値列として書き込む
            Ok((AttributeValue::Integer(i64::from(id)), default_adjustment_percent(name)))
        }
        DatasetKind::Application => {
            if crop.is_some() {
                warn!("--crop is ignored for application data");
            }
            bail!("Application data needs a product name; pass --label");
        }
    }
}

fn process_file(path: &Path, prefix: &str, run: &Run) -> Result<()> {
    info!("Processing boundary file: {:?}", path);

    let uploaded = load_boundary_file(path)?;
    let boundary = resolve(&run.drawn, Some(&uploaded))?;
    if let Some(center) = boundary.center() {
        info!(
            "Boundary area: {:.8} deg², center: ({:.6}, {:.6})",
            boundary.area(),
            center.x(),
            center.y()
        );
    }

    let generated = generate(&run.reference, Some(&boundary), &run.options)?;

    let output_path = write_archive(&generated, run.format, &run.output, Some(prefix))?;
    info!(
        "Written {} records for {:?}: {:?}",
        generated.len(),
        path,
        output_path
    );

    Ok(())
}

fn process_directory(dir: &Path, run: &Run) -> Result<()> {
    use rayon::prelude::*;

    // 境界ファイルを再帰的に収集
    let input_files = collect_input_files(dir)?;
    info!("Found {} boundary files", input_files.len());

    // 出力名の重複は書き込み前に検出する
    let jobs: Vec<(PathBuf, String)> = input_files
        .into_iter()
        .map(|path| {
            let prefix = output_prefix(dir, &path);
            (path, prefix)
        })
        .collect();
    check_unique_prefixes(&jobs)?;

    // 並列処理で境界ごとにデータを生成
    let results: Vec<Result<()>> = jobs
        .par_iter()
        .map(|(path, prefix)| process_file(path, prefix, run))
        .collect();

    // エラーをチェック
    let mut errors = Vec::new();
    for (i, result) in results.into_iter().enumerate() {
        if let Err(e) = result {
            errors.push(format!("{}: {}", jobs[i].0.display(), e));
        }
    }

    if !errors.is_empty() {
        error!("Failed to process {} files:", errors.len());
        for err in &errors {
            error!("  {}", err);
        }
        bail!("{} files failed to process", errors.len());
    }

    Ok(())
}

fn collect_input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    let mut files = Vec::new();
    for path in entries {
        if path.is_dir() {
            // サブディレクトリを再帰的に探索
            files.extend(collect_input_files(&path)?);
        } else if BoundaryFormat::from_path(&path).is_ok() {
            files.push(path);
        }
    }
    Ok(files)
}

/// 入力ディレクトリからの相対パス（拡張子を含む）を出力名の接頭辞にする
///
/// `a/field.kml` は `a_field_kml` になる。
fn output_prefix(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().replace('.', "_")),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("_")
}

fn check_unique_prefixes(jobs: &[(PathBuf, String)]) -> Result<()> {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for (path, prefix) in jobs {
        if let Some(other) = seen.insert(prefix.as_str(), path.as_path()) {
            bail!(
                "{} and {} would write the same output ({})",
                other.display(),
                path.display(),
                prefix
            );
        }
    }
    Ok(())
}
