use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::output::{print_json, print_table};
use crate::setup;

#[derive(Serialize)]
struct SceneRow<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    alias_of: Option<&'a str>,
}

pub fn run(config_path: Option<&Path>, all: bool, json: bool) -> Result<()> {
    let config = setup::load_config(config_path)?;
    let table = setup::load_scene_table(&config)?;

    let mut rows: Vec<SceneRow<'_>> = table
        .primary_scenes()
        .into_iter()
        .map(|name| SceneRow {
            name,
            alias_of: None,
        })
        .collect();
    if all {
        rows.extend(table.aliases().into_iter().map(|(name, target)| SceneRow {
            name,
            alias_of: Some(target),
        }));
    }

    if json {
        return print_json(&rows);
    }

    if all {
        let table_rows = rows
            .iter()
            .map(|r| vec![r.name.to_string(), r.alias_of.unwrap_or("").to_string()])
            .collect();
        print_table(&["SCENE", "ALIAS OF"], table_rows);
    } else {
        for row in &rows {
            println!("{}", row.name);
        }
    }
    Ok(())
}
