//! Given steps for review lifecycle BDD scenarios.

use super::world::{ReviewWorld, reviewer_ids, run_async};
use eyre::WrapErr;
use mockable::DefaultClock;
use rota::roster::domain::{Reviewer, ReviewerId, ReviewerRole};
use rstest_bdd_macros::given;

fn register(world: &ReviewWorld, id: ReviewerId, role: ReviewerRole) -> Result<(), eyre::Report> {
    let reviewer = Reviewer::new(id.clone(), id.as_str(), role, &DefaultClock)
        .wrap_err("build roster member")?;
    run_async(world.service.register_reviewer(reviewer)).wrap_err("register roster member")?;
    Ok(())
}

#[given(r#"a roster of reviewers "{reviewers}" and author "{author}""#)]
fn roster(world: &mut ReviewWorld, reviewers: String, author: String) -> Result<(), eyre::Report> {
    for id in reviewer_ids(&reviewers)? {
        register(world, id, ReviewerRole::Reviewer)?;
    }
    let author_id =
        ReviewerId::new(author).map_err(|err| eyre::eyre!("bad author id: {err}"))?;
    register(world, author_id, ReviewerRole::AuthorOnly)
}
