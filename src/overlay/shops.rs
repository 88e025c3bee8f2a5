// Shop inventory overflow.
//
// A shop's goods list holds at most `SHOP_CAPACITY` entries. After merging,
// surplus entries move to the next shop in the configured shop list that has
// room, pulling further shop archives from the game tree when the merged
// output runs out of them.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;

use crate::config::ShopsEntry;
use crate::document::Document;
use crate::io::copy_file;

use super::{Context, OverlayError, Report};

pub const SHOP_CAPACITY: usize = 111;

const GOODS_LIST: &str = "GoodsList";

/// Archive member holding the shop parameters of `actor`.
pub fn shop_param_key(actor: &str) -> String {
    format!("Component/ShopParam/{actor}.game__component__ShopParam.bgyml")
}

fn shop_archive(root: &Path, actor: &str) -> PathBuf {
    root.join("Pack")
        .join("Actor")
        .join(format!("{actor}.pack.zs"))
}

struct Shop {
    actor: String,
    archive: PathBuf,
}

pub struct ShopsOverflow<'a> {
    ctx: &'a Context,
    output: &'a Path,
    queue: VecDeque<Shop>,
    /// Shops not processed yet, in shop-list order.
    remaining: IndexSet<String>,
    overflow: Vec<Document>,
}

impl<'a> ShopsOverflow<'a> {
    /// Queue every listed shop whose archive is present in `output`.
    pub fn new(ctx: &'a Context, output: &'a Path, shops: &[ShopsEntry]) -> Self {
        let remaining: IndexSet<String> = shops.iter().map(|s| s.actor_name.clone()).collect();
        let queue = remaining
            .iter()
            .map(|actor| Shop {
                actor: actor.clone(),
                archive: shop_archive(output, actor),
            })
            .filter(|shop| shop.archive.is_file())
            .collect();
        Self {
            ctx,
            output,
            queue,
            remaining,
            overflow: Vec::new(),
        }
    }

    pub fn run(mut self, report: &mut Report) -> Result<(), OverlayError> {
        while let Some(shop) = self.queue.pop_front() {
            self.remaining.shift_remove(&shop.actor);
            log::debug!("processing shop {}", shop.actor);
            self.process(&shop, report)?;

            if !self.overflow.is_empty() && self.queue.is_empty() {
                self.pull_next_shop(report)?;
            }
        }
        Ok(())
    }

    fn process(&mut self, shop: &Shop, report: &mut Report) -> Result<(), OverlayError> {
        let mut entries = match self.ctx.read_archive(&shop.archive) {
            Ok(entries) => entries,
            Err(OverlayError::InvalidContainer { path, source }) => {
                log::warn!("cannot read shop archive {}: {source}, skipping", path.display());
                report.warnings += 1;
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        let key = shop_param_key(&shop.actor);
        let Some(param) = entries.get(&key) else {
            log::debug!("{} has no shop parameters, skipping", shop.archive.display());
            return Ok(());
        };

        let mut doc = self.ctx.codec().decode(param)?;
        let Some(goods) = doc
            .as_map_mut()
            .and_then(|map| map.get_mut(GOODS_LIST))
            .and_then(Document::as_array_mut)
        else {
            log::warn!("shop for {} has no goods list, skipping", shop.actor);
            report.warnings += 1;
            return Ok(());
        };

        let mut changed = false;
        if goods.len() > SHOP_CAPACITY {
            let spilled = goods.split_off(SHOP_CAPACITY);
            log::info!("{} shop overflowed {}", shop.actor, spilled.len());
            self.overflow.extend(spilled);
            changed = true;
        }

        let mut added = 0;
        while goods.len() < SHOP_CAPACITY {
            let Some(item) = self.overflow.pop() else {
                break;
            };
            goods.push(item);
            added += 1;
        }
        if added > 0 {
            log::info!("{} shop added {added} overflow items", shop.actor);
            changed = true;
        }

        if changed {
            entries.put(key, self.ctx.codec().encode(&doc)?);
            self.ctx.write_archive(&shop.archive, &entries)?;
            report.written += 1;
        }
        Ok(())
    }

    /// Copy the next unprocessed shop from the game tree into the output and
    /// queue it. Surplus that no shop can take is dropped.
    fn pull_next_shop(&mut self, report: &mut Report) -> Result<(), OverlayError> {
        while let Some(actor) = self.remaining.shift_remove_index(0) {
            let original = shop_archive(self.ctx.game_path(), &actor);
            if !original.is_file() {
                log::warn!("shop archive {} not found in the game tree", original.display());
                report.warnings += 1;
                continue;
            }
            let archive = shop_archive(self.output, &actor);
            copy_file(&original, &archive)?;
            report.copied += 1;
            self.queue.push_back(Shop { actor, archive });
            return Ok(());
        }
        log::warn!(
            "shop items overflow exceeds shops - discarding {} shop entries",
            self.overflow.len()
        );
        report.warnings += 1;
        self.overflow.clear();
        Ok(())
    }
}
