mod app;
mod blob;
mod cli;
mod compositor;
mod config;
mod engine;
mod field;
mod highlight;
mod motion;
mod noise;
mod render;
mod spacing;

use anyhow::Result;

fn main() -> Result<()> {
    app::run()
}
