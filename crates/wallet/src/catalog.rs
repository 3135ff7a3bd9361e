use rust_decimal::Decimal;
use serde::Serialize;

/// Filter value that matches every category or risk level.
pub const ANY: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: u32,
    pub name: &'static str,
    pub category: &'static str,
    /// Advertised yield, display only. Dashboard ROI is derived from the name.
    pub apy: &'static str,
    pub description: &'static str,
    pub risk: &'static str,
    pub min_investment: u32,
    pub lock_period: &'static str,
}

impl Project {
    pub fn min_investment(&self) -> Decimal {
        Decimal::from(self.min_investment)
    }

    fn matches_search(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

pub const PROJECTS: [Project; 6] = [
    Project {
        id: 1,
        name: "Qubic Staking",
        category: "Staking",
        apy: "7.5%",
        description: "Earn passive interest by staking QUBIC tokens. Instant liquidity and daily rewards.",
        risk: "Bajo",
        min_investment: 100,
        lock_period: "Flexible",
    },
    Project {
        id: 2,
        name: "USDQ Farming",
        category: "Yield Farming",
        apy: "10.2%",
        description: "Provide liquidity to the USDQ-USDC pair and earn Qubic governance token rewards.",
        risk: "Medio-Bajo",
        min_investment: 250,
        lock_period: "30 días",
    },
    Project {
        id: 3,
        name: "Qubic DeFi Index",
        category: "Index",
        apy: "12.8%",
        description: "Diversified exposure to the leading DeFi protocols through a single index token.",
        risk: "Medio",
        min_investment: 500,
        lock_period: "90 días",
    },
    Project {
        id: 4,
        name: "Lending Pool",
        category: "Lending",
        apy: "9.5%",
        description: "Lend USDQ to other users and earn competitive interest backed by over-collateralised loans.",
        risk: "Medio-Bajo",
        min_investment: 100,
        lock_period: "Flexible",
    },
    Project {
        id: 5,
        name: "Qubic Launchpad",
        category: "Investment",
        apy: "20%+",
        description: "Invest in promising projects ahead of their public launch with priority access.",
        risk: "Alto",
        min_investment: 1000,
        lock_period: "180 días",
    },
    Project {
        id: 6,
        name: "Automatic Market Maker",
        category: "Liquidity",
        apy: "14.3%",
        description: "Provide liquidity to popular trading pairs and collect a fee on every swap.",
        risk: "Medio",
        min_investment: 500,
        lock_period: "60 días",
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub risk: Option<String>,
}

fn exact_or_any(filter: Option<&str>, value: &str) -> bool {
    match filter {
        None => true,
        Some(f) if f.is_empty() || f == ANY => true,
        Some(f) => f == value,
    }
}

pub fn find_project(id: u32) -> Option<&'static Project> {
    PROJECTS.iter().find(|p| p.id == id)
}

/// Catalog entries matching every set filter, in catalog order.
pub fn filter_projects(filter: &ProjectFilter) -> Vec<&'static Project> {
    let needle = filter
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default();
    PROJECTS
        .iter()
        .filter(|p| p.matches_search(&needle))
        .filter(|p| exact_or_any(filter.category.as_deref(), p.category))
        .filter(|p| exact_or_any(filter.risk.as_deref(), p.risk))
        .collect()
}
