/// Data layer: core types and trace loading.
///
/// Architecture:
/// ```text
///  .dat / .txt / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  skip header, pick columns → RawTrace
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │   RawTrace    │  row-major matrix, counts() = last column
///   └──────────────┘
///        │
///        ▼
///   LaserPulseSet → AnalysisResult  (see `dispatcher`)
/// ```

pub mod loader;
pub mod model;
