use crate::catalog::Catalog;
use crate::navigation::container::ScheduleOptions;
use crate::navigation::rooms::ActivityContainer;
use crate::quests::stage::Stage;
use crate::quests::Quest;
use crate::shared::ScheduleError;

pub fn populate_quests(catalog: &mut Catalog) {
    catalog.quests.add(help_alice());
}

/// Alice asks for help with a gift for Bob; her answer only comes two days
/// after the gift is bought.
fn help_alice() -> Quest {
    Quest::new(
        "help_alice",
        [
            Stage::new("talk_to_alice")
                .with_name("Talk to Alice")
                .with_description("Alice seemed worried. Find her on the terrace.")
                .goal_flag("talked_to_alice")
                .on_start(|_, ctx| {
                    let terrace = ctx
                        .catalog
                        .rooms
                        .get("terrace")
                        .ok_or_else(|| ScheduleError::Callback("terrace is not registered".into()))?;
                    terrace.add_activity(ctx.storage, ctx.clock, "talk_alice", ScheduleOptions::time(10.0, 20.0))
                })
                .on_end(|_, ctx| {
                    if let Some(terrace) = ctx.catalog.rooms.get("terrace") {
                        terrace.remove_activity(ctx.storage, "talk_alice", None);
                    }
                    Ok(())
                }),
            Stage::new("buy_gift")
                .with_name("Buy a gift")
                .with_description("Alice wants to give Bob something. Buy it for her.")
                .with_request_description("Buy a gift for Bob")
                .goal_flag("gift_bought"),
            Stage::new("wait_for_answer")
                .with_name("Wait for an answer")
                .with_description("Alice will tell you how it went in a couple of days.")
                .after_days(2),
            Stage::new("celebrate")
                .with_name("Celebrate")
                .with_description("Bob liked the gift. Celebrate with Alice.")
                .requires_flag("bob_liked_gift"),
        ],
    )
    .with_name("Help Alice")
    .with_description("Alice needs a hand with a gift.")
    .on_next_stage(|quest, ctx| {
        let index = quest.current_stage_index(ctx.storage).unwrap_or(0);
        ctx.storage.set(&format!("journal:{}", quest.id()), &index);
        Ok(())
    })
}
