// src/tasks.rs
//! Predefined ACS prediction tasks.

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;

use crate::definitions::CategoryMap;
use crate::problem::{BasicProblem, CmpOp, Condition, Postprocess, RowFilter, Transform};

pub const TASK_NAMES: &[&str] = &[
    "ACSIncome",
    "ACSEmployment",
    "ACSHealthInsurance",
    "ACSPublicCoverage",
    "ACSTravelTime",
    "ACSMobility",
    "ACSEmploymentFiltered",
    "ACSIncomePovertyRatio",
];

fn keep(column: &str, op: CmpOp, value: f64) -> RowFilter {
    RowFilter::Keep(Condition::cmp(column, op, value))
}

fn task(name: &str, features: &[&str], target: &str, transform: Transform) -> BasicProblem {
    BasicProblem::new(name, features, target)
        .target_transform(transform)
        .group("RAC1P")
        .postprocess(Postprocess::NanToNum(0.0))
}

/// Adult records with an income, working hours and a positive weight.
pub fn adult_filter(p: BasicProblem) -> BasicProblem {
    p.preprocess(keep("AGEP", CmpOp::Gt, 16.0))
        .preprocess(keep("PINCP", CmpOp::Gt, 100.0))
        .preprocess(keep("WKHP", CmpOp::Gt, 0.0))
        .preprocess(keep("PWGTP", CmpOp::Ge, 1.0))
}

/// Income above 50,000 for adults.
pub fn acs_income() -> BasicProblem {
    adult_filter(task(
        "ACSIncome",
        &[
            "AGEP", "COW", "SCHL", "MAR", "OCCP", "POBP", "RELP", "WKHP", "SEX", "RAC1P",
        ],
        "PINCP",
        Transform::GreaterThan(50000.0),
    ))
}

pub fn acs_employment() -> BasicProblem {
    task(
        "ACSEmployment",
        &[
            "AGEP", "SCHL", "MAR", "RELP", "DIS", "ESP", "CIT", "MIG", "MIL", "ANC",
            "NATIVITY", "DEAR", "DEYE", "DREM", "SEX", "RAC1P",
        ],
        "ESR",
        Transform::Equals(1.0),
    )
}

pub fn acs_health_insurance() -> BasicProblem {
    task(
        "ACSHealthInsurance",
        &[
            "AGEP", "SCHL", "MAR", "SEX", "DIS", "ESP", "CIT", "MIG", "MIL", "ANC",
            "NATIVITY", "DEAR", "DEYE", "DREM", "RACAIAN", "RACASN", "RACBLK", "RACNH",
            "RACPI", "RACSOR", "RACWHT", "PINCP", "ESR", "ST", "FER",
        ],
        "HINS2",
        Transform::Equals(1.0),
    )
}

/// Public health coverage among low-income people under 65.
pub fn acs_public_coverage() -> BasicProblem {
    task(
        "ACSPublicCoverage",
        &[
            "AGEP", "SCHL", "MAR", "SEX", "DIS", "ESP", "CIT", "MIG", "MIL", "ANC",
            "NATIVITY", "DEAR", "DEYE", "DREM", "PINCP", "ESR", "ST", "FER", "RAC1P",
        ],
        "PUBCOV",
        Transform::Equals(1.0),
    )
    .preprocess(keep("AGEP", CmpOp::Lt, 65.0))
    .preprocess(keep("PINCP", CmpOp::Le, 30000.0))
}

/// Commute longer than 20 minutes for employed adults.
pub fn acs_travel_time() -> BasicProblem {
    task(
        "ACSTravelTime",
        &[
            "AGEP", "SCHL", "MAR", "SEX", "DIS", "ESP", "MIG", "RELP", "RAC1P", "PUMA", "ST",
            "CIT", "OCCP", "JWTR", "POWPUMA", "POVPIP",
        ],
        "JWMNP",
        Transform::GreaterThan(20.0),
    )
    .preprocess(keep("AGEP", CmpOp::Gt, 16.0))
    .preprocess(keep("PWGTP", CmpOp::Ge, 1.0))
    .preprocess(keep("ESR", CmpOp::Eq, 1.0))
}

/// Same residence as a year ago, for ages 19 to 34. Rows without an age are kept.
pub fn acs_mobility() -> BasicProblem {
    task(
        "ACSMobility",
        &[
            "AGEP", "SCHL", "MAR", "SEX", "DIS", "ESP", "CIT", "MIL", "ANC", "NATIVITY",
            "RELP", "DEAR", "DEYE", "DREM", "RAC1P", "GCL", "COW", "ESR", "WKHP", "JWMNP",
            "PINCP",
        ],
        "MIG",
        Transform::Equals(1.0),
    )
    .preprocess(RowFilter::Drop(Condition::Any(vec![
        Condition::cmp("AGEP", CmpOp::Le, 18.0),
        Condition::cmp("AGEP", CmpOp::Ge, 35.0),
    ])))
}

pub fn acs_employment_filtered() -> BasicProblem {
    task(
        "ACSEmploymentFiltered",
        &[
            "AGEP", "SCHL", "MAR", "SEX", "DIS", "ESP", "MIG", "CIT", "MIL", "ANC",
            "NATIVITY", "RELP", "DEAR", "DEYE", "DREM", "RAC1P", "GCL",
        ],
        "ESR",
        Transform::Equals(1.0),
    )
    .preprocess(keep("AGEP", CmpOp::Gt, 16.0))
    .preprocess(keep("AGEP", CmpOp::Lt, 90.0))
    .preprocess(keep("PWGTP", CmpOp::Ge, 1.0))
}

pub fn acs_income_poverty_ratio() -> BasicProblem {
    task(
        "ACSIncomePovertyRatio",
        &[
            "AGEP", "SCHL", "MAR", "SEX", "DIS", "ESP", "MIG", "CIT", "MIL", "ANC",
            "NATIVITY", "RELP", "DEAR", "DEYE", "DREM", "RAC1P", "GCL", "ESR", "OCCP",
            "WKHP",
        ],
        "POVPIP",
        Transform::LessThan(250.0),
    )
}

/// Case-insensitive lookup; the `ACS` prefix may be omitted.
pub fn by_name(name: &str) -> Result<BasicProblem> {
    let wanted = name.trim().to_ascii_lowercase();
    let wanted = wanted.strip_prefix("acs").unwrap_or(&wanted);
    let task = match wanted {
        "income" => acs_income(),
        "employment" => acs_employment(),
        "healthinsurance" => acs_health_insurance(),
        "publiccoverage" => acs_public_coverage(),
        "traveltime" => acs_travel_time(),
        "mobility" => acs_mobility(),
        "employmentfiltered" => acs_employment_filtered(),
        "incomepovertyratio" => acs_income_poverty_ratio(),
        _ => {
            return Err(anyhow!(
                "unknown task {:?}; expected one of: {}",
                name,
                TASK_NAMES.join(", ")
            ))
        }
    };
    Ok(task)
}

pub fn all() -> Vec<BasicProblem> {
    TASK_NAMES.iter().filter_map(|n| by_name(n).ok()).collect()
}

const COW: &[(u32, &str)] = &[
    (1, "Employee of a private for-profit company or business, or of an individual, for wages, salary, or commissions"),
    (2, "Employee of a private not-for-profit, tax-exempt, or charitable organization"),
    (3, "Local government employee (city, county, etc.)"),
    (4, "State government employee"),
    (5, "Federal government employee"),
    (6, "Self-employed in own not incorporated business, professional practice, or farm"),
    (7, "Self-employed in own incorporated business, professional practice or farm"),
    (8, "Working without pay in family business or farm"),
    (9, "Unemployed and last worked 5 years ago or earlier or never worked"),
];

const SCHL: &[(u32, &str)] = &[
    (1, "No schooling completed"),
    (2, "Nursery school, preschool"),
    (3, "Kindergarten"),
    (4, "Grade 1"),
    (5, "Grade 2"),
    (6, "Grade 3"),
    (7, "Grade 4"),
    (8, "Grade 5"),
    (9, "Grade 6"),
    (10, "Grade 7"),
    (11, "Grade 8"),
    (12, "Grade 9"),
    (13, "Grade 10"),
    (14, "Grade 11"),
    (15, "12th grade - no diploma"),
    (16, "Regular high school diploma"),
    (17, "GED or alternative credential"),
    (18, "Some college, but less than 1 year"),
    (19, "1 or more years of college credit, no degree"),
    (20, "Associate's degree"),
    (21, "Bachelor's degree"),
    (22, "Master's degree"),
    (23, "Professional degree beyond a bachelor's degree"),
    (24, "Doctorate degree"),
];

const MAR: &[(u32, &str)] = &[
    (1, "Married"),
    (2, "Widowed"),
    (3, "Divorced"),
    (4, "Separated"),
    (5, "Never married or under 15 years old"),
];

const SEX: &[(u32, &str)] = &[(1, "Male"), (2, "Female")];

const RAC1P: &[(u32, &str)] = &[
    (1, "White alone"),
    (2, "Black or African American alone"),
    (3, "American Indian alone"),
    (4, "Alaska Native alone"),
    (5, "American Indian and Alaska Native tribes specified; or American Indian or Alaska Native, not specified and no other"),
    (6, "Asian alone"),
    (7, "Native Hawaiian and Other Pacific Islander alone"),
    (8, "Some Other Race alone"),
    (9, "Two or More Races"),
];

fn category_map(codes: &[(u32, &str)]) -> CategoryMap {
    CategoryMap {
        codes: codes
            .iter()
            .map(|(code, label)| (code.to_string(), label.to_string()))
            .collect(),
        missing: "N/A".to_string(),
    }
}

/// Labels for the categorical ACSIncome features, usable without the data dictionary.
/// OCCP, POBP and RELP are not covered.
pub fn income_categories() -> BTreeMap<String, CategoryMap> {
    [("COW", COW), ("SCHL", SCHL), ("MAR", MAR), ("SEX", SEX), ("RAC1P", RAC1P)]
        .into_iter()
        .map(|(feature, codes)| (feature.to_string(), category_map(codes)))
        .collect()
}

/// Built-in category labels for a task, if it has any. Same name rules as [`by_name`].
pub fn builtin_categories(name: &str) -> Result<Option<BTreeMap<String, CategoryMap>>> {
    let task = by_name(name)?;
    Ok(match task.name() {
        "ACSIncome" => Some(income_categories()),
        _ => None,
    })
}
