use colored::*;
use std::io::{self, BufRead, Write};
use vmupro_core::catalog::GameCatalog;
use vmupro_core::reconcile::{canonical_id, suggest_query};
use vmupro_core::{Error, Resolution, Resolver, UnmatchedGroup};

const SHOWN_HITS: usize = 10;

/// Asks on stdin. Accepts a listed number, a game id, or new search text.
pub struct PromptResolver {
    position: usize,
    total: usize,
}

impl PromptResolver {
    pub fn new(total: usize) -> Self {
        Self { position: 0, total }
    }
}

impl Resolver for PromptResolver {
    fn resolve(&mut self, group: &UnmatchedGroup, catalog: &GameCatalog) -> Result<Resolution, Error> {
        self.position += 1;
        println!();
        println!(
            "[{}/{}] {} ({} save{})",
            self.position,
            self.total,
            group.signature.as_str().bold(),
            group.files.len(),
            if group.files.len() == 1 { "" } else { "s" }
        );
        println!("  {}", group.folder_path.display().to_string().dimmed());

        let mut query = suggest_query(&group.signature);
        let stdin = io::stdin();
        loop {
            let hits: Vec<String> = catalog
                .search(&query, SHOWN_HITS)
                .into_iter()
                .map(|hit| hit.record.id.clone())
                .collect();
            if hits.is_empty() {
                println!("  No games match \"{}\"", query);
            } else {
                println!("  Matches for \"{}\":", query);
                for (i, id) in hits.iter().enumerate() {
                    if let Some(record) = catalog.get(id) {
                        println!(
                            "  {:>3}. {:<14} {} ({})",
                            i + 1,
                            record.id.cyan(),
                            record.title,
                            record.region
                        );
                    }
                }
            }

            print!("  Number, game id or search text ([s]kip, [q]uit): ");
            io::stdout().flush()?;
            let mut input = String::new();
            if stdin.lock().read_line(&mut input)? == 0 {
                return Ok(Resolution::SkipAll);
            }
            let input = input.trim();

            match input.to_lowercase().as_str() {
                "" | "s" => return Ok(Resolution::Skip),
                "q" => return Ok(Resolution::SkipAll),
                _ => {}
            }
            if let Ok(n) = input.parse::<usize>() {
                if let Some(id) = n.checked_sub(1).and_then(|i| hits.get(i)) {
                    return Ok(Resolution::Accept(id.clone()));
                }
            }
            if canonical_id(catalog, input).is_some() {
                return Ok(Resolution::Accept(input.to_string()));
            }
            query = input.to_string();
        }
    }

    fn rejected(&mut self, _group: &UnmatchedGroup, game_id: &str) {
        println!("  {} is not in the game database", game_id.red());
        self.position -= 1;
    }
}
