use {
    anyhow::Result,
    vergen::{BuildBuilder, Emitter},
    vergen_gitcl::GitclBuilder,
};

// Emits VERGEN_* variables consumed by `build_info`.
// Outside of a git checkout the git ones fall back to placeholders.
fn main() -> Result<()> {
    let build = BuildBuilder::default().build_date(true).build()?;

    let gitcl = GitclBuilder::default()
        .all()
        .describe(true, true, None)
        .build()?;

    Emitter::default()
        .add_instructions(&gitcl)?
        .add_instructions(&build)?
        .emit()?;

    Ok(())
}
