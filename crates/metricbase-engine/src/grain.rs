use crate::error::ConfigurationError;
use metricbase_config::{ColumnNames, MissingKeyPolicy};
use std::fmt;

/// Organizational level results are grouped at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Team,
    ReleaseTrain,
    Community,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Team,
        EntityKind::ReleaseTrain,
        EntityKind::Community,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Team => "team",
            EntityKind::ReleaseTrain => "release_train",
            EntityKind::Community => "community",
        }
    }

    /// Every accepted spelling, canonical name first.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            EntityKind::Team => &["team", "squad"],
            EntityKind::ReleaseTrain => &["release_train"],
            EntityKind::Community => &["community", "comunidade"],
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.aliases().contains(&name.as_str()))
    }

    /// Column holding this entity's identifier.
    pub fn identity_column(self, columns: &ColumnNames) -> &str {
        match self {
            EntityKind::Team => &columns.team,
            EntityKind::ReleaseTrain => &columns.release_train,
            EntityKind::Community => &columns.community,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeGrain {
    /// One row per period.
    Monthly,
    /// Periods collapsed into a single cumulative row.
    CumulativeMonthly,
}

impl TimeGrain {
    pub const ALL: [TimeGrain; 2] = [TimeGrain::Monthly, TimeGrain::CumulativeMonthly];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeGrain::Monthly => "monthly",
            TimeGrain::CumulativeMonthly => "cumulative_monthly",
        }
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            TimeGrain::Monthly => &["monthly", "mensal"],
            TimeGrain::CumulativeMonthly => &["cumulative_monthly", "acumulado_mensal"],
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|grain| grain.aliases().contains(&name.as_str()))
    }
}

impl fmt::Display for TimeGrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Granularity {
    pub entity: EntityKind,
    pub grain: TimeGrain,
}

impl Granularity {
    pub fn new(entity: EntityKind, grain: TimeGrain) -> Self {
        Self { entity, grain }
    }

    pub fn parse(entity: &str, grain: &str) -> Result<Self, ConfigurationError> {
        match (EntityKind::parse(entity), TimeGrain::parse(grain)) {
            (Some(entity), Some(grain)) => Ok(Self { entity, grain }),
            _ => Err(ConfigurationError::UnsupportedGranularity {
                entity: entity.to_string(),
                grain: grain.to_string(),
            }),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity, self.grain)
    }
}

/// Ordered group-by column names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupKeySet {
    keys: Vec<String>,
}

impl GroupKeySet {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keys
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.keys.iter().any(|k| k == column)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.keys
    }
}

/// Where the group keys of an aggregation come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySource<'a> {
    /// The fixed per-granularity table.
    Granularity,
    /// An explicit list, as given by a block-style configuration.
    Explicit(&'a [String]),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedKeys {
    pub keys: GroupKeySet,
    /// Keys absent from the input that must be filled with nulls. Only populated under
    /// [`MissingKeyPolicy::FillNull`], and never holds the entity identity column.
    pub missing: Vec<String>,
}

#[derive(Clone, Copy, Debug)]
pub struct GroupKeyResolver<'a> {
    columns: &'a ColumnNames,
    policy: MissingKeyPolicy,
}

impl<'a> GroupKeyResolver<'a> {
    pub fn new(columns: &'a ColumnNames, policy: MissingKeyPolicy) -> Self {
        Self { columns, policy }
    }

    /// The fixed key table.
    pub fn keys_for(&self, granularity: Granularity) -> GroupKeySet {
        let c = self.columns;
        let keys: Vec<&str> = match (granularity.entity, granularity.grain) {
            (EntityKind::Team, TimeGrain::CumulativeMonthly) => vec![c.team.as_str()],
            (EntityKind::Team, TimeGrain::Monthly) => vec![
                c.period.as_str(),
                c.community.as_str(),
                c.release_train.as_str(),
                c.team.as_str(),
            ],
            (EntityKind::ReleaseTrain, TimeGrain::CumulativeMonthly) => {
                vec![c.release_train.as_str()]
            }
            (EntityKind::ReleaseTrain, TimeGrain::Monthly) => vec![
                c.period.as_str(),
                c.community.as_str(),
                c.release_train.as_str(),
            ],
            (EntityKind::Community, TimeGrain::CumulativeMonthly) => vec![c.community.as_str()],
            (EntityKind::Community, TimeGrain::Monthly) => {
                vec![c.period.as_str(), c.community.as_str()]
            }
        };
        GroupKeySet::new(keys.into_iter().map(str::to_string).collect())
    }

    /// Resolve the group keys and check them against the input's columns.
    pub fn resolve<S: AsRef<str>>(
        &self,
        granularity: Granularity,
        source: KeySource<'_>,
        available_columns: &[S],
    ) -> Result<ResolvedKeys, ConfigurationError> {
        let keys = match source {
            KeySource::Granularity => self.keys_for(granularity),
            KeySource::Explicit(keys) => GroupKeySet::new(keys.to_vec()),
        };
        if keys.is_empty() {
            return Err(ConfigurationError::NoGroupingKey);
        }

        // The entity identity can never be filled: every row would share one null group.
        let identity = granularity.entity.identity_column(self.columns);
        let mut missing = Vec::new();
        for key in keys.iter() {
            if available_columns.iter().any(|c| c.as_ref() == key.as_str()) {
                continue;
            }
            match self.policy {
                MissingKeyPolicy::FillNull if key.as_str() != identity => {
                    missing.push(key.clone())
                }
                _ => {
                    return Err(ConfigurationError::MissingGroupColumn {
                        column: key.clone(),
                    })
                }
            }
        }
        if missing.len() == keys.len() {
            return Err(ConfigurationError::NoGroupingKey);
        }

        Ok(ResolvedKeys { keys, missing })
    }

    /// [`GroupKeyResolver::resolve`] for granularity names as they appear in configuration.
    pub fn resolve_named<S: AsRef<str>>(
        &self,
        entity: &str,
        grain: &str,
        available_columns: &[S],
    ) -> Result<ResolvedKeys, ConfigurationError> {
        let granularity = Granularity::parse(entity, grain)?;
        self.resolve(granularity, KeySource::Granularity, available_columns)
    }
}
