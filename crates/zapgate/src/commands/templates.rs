//! `zapgate templates`

use std::collections::HashMap;

use anyhow::{Context as _, Result, bail};

use zapgate::templates::TemplateSet;

pub fn list(format: &str) -> Result<()> {
    let set = TemplateSet::default();
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&set)?),
        "text" => {
            for template in set.iter() {
                println!("{} ({})", template.id, template.name);
                println!("  {}", template.content);
                println!("  variables: {}", template.variables().join(", "));
            }
        }
        other => bail!("unknown format '{other}' (expected text or json)"),
    }
    Ok(())
}

pub fn render(id: &str, vars: &[String]) -> Result<()> {
    let vars = parse_vars(vars)?;
    let text = TemplateSet::default()
        .render(id, &vars)
        .with_context(|| format!("failed to render template '{id}'"))?;
    println!("{text}");
    Ok(())
}

fn parse_vars(pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => bail!("invalid --var '{pair}' (expected key=value)"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_vars_splits_on_first_equals() {
        let vars = parse_vars(&["payment_link=https://x/?a=b".to_string()]).unwrap();
        assert_eq!(vars["payment_link"], "https://x/?a=b");
    }

    #[test]
    fn parse_vars_rejects_missing_key() {
        assert!(parse_vars(&["=value".to_string()]).is_err());
        assert!(parse_vars(&["novalue".to_string()]).is_err());
    }
}
