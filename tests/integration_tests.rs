//! End-to-end conversations through the dialog manager

use adaptive_dialog::actions::{CancelAllDialogs, SendActivity};
use adaptive_dialog::resources::MemoryResourceProvider;
use adaptive_dialog::{
    Action, Activity, AdaptiveDialog, ComponentRegistry, DialogManager, DialogTurnStatus, MemoryStorage,
    OnCondition, RegexRecognizer, TextInput, TurnOutcome,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const TODO_BOT: &str = include_str!("../demos/todo_bot.dialog");

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn say(manager: &DialogManager, text: &str) -> TurnOutcome {
    manager
        .on_turn(Activity::message(text).with_conversation("test", "c1", "u1"))
        .await
        .unwrap()
}

fn texts(outcome: &TurnOutcome) -> Vec<&str> {
    outcome.responses.iter().map(Activity::text_or_empty).collect()
}

fn booking_bot(intercept_cancel: bool) -> AdaptiveDialog {
    let recognizer = RegexRecognizer::new()
        .with_intent("Book", "^book")
        .and_then(|r| r.with_intent("Cancel", "^cancel$"))
        .unwrap();
    let book: Vec<Arc<dyn Action>> = vec![
        Arc::new(TextInput::new("dialog.city").with_prompt("Which city?")),
        Arc::new(SendActivity::new("Booked ${dialog.city}")),
    ];
    let mut dialog = AdaptiveDialog::new("booking")
        .with_auto_end_dialog(false)
        .with_recognizer(Arc::new(recognizer))
        .with_trigger(OnCondition::on_intent("Book", Vec::new(), book))
        .with_trigger(OnCondition::on_intent(
            "Cancel",
            Vec::new(),
            vec![Arc::new(CancelAllDialogs::new())],
        ));
    if intercept_cancel {
        dialog = dialog.with_trigger(OnCondition::on_cancel_dialog(vec![Arc::new(SendActivity::new(
            "Cancel intercepted",
        ))]));
    }
    dialog
}

#[tokio::test]
async fn test_cancel_ends_conversation_and_restarts() {
    init_tracing();
    let manager = DialogManager::new(Arc::new(booking_bot(false)), Arc::new(MemoryStorage::new()));

    assert_eq!(texts(&say(&manager, "book").await), vec!["Which city?"]);

    let cancelled = say(&manager, "cancel").await;
    assert_eq!(cancelled.status, DialogTurnStatus::Cancelled);
    assert!(cancelled.responses.is_empty());

    let restarted = say(&manager, "book").await;
    assert_eq!(texts(&restarted), vec!["Which city?"]);
    assert_eq!(restarted.status, DialogTurnStatus::Waiting);
}

#[tokio::test]
async fn test_cancel_trigger_intercepts_and_resumes_input() {
    init_tracing();
    let manager = DialogManager::new(Arc::new(booking_bot(true)), Arc::new(MemoryStorage::new()));

    say(&manager, "book").await;
    let intercepted = say(&manager, "cancel").await;
    assert_eq!(texts(&intercepted), vec!["Cancel intercepted", "Which city?"]);
    assert_eq!(intercepted.status, DialogTurnStatus::Waiting);

    assert_eq!(texts(&say(&manager, "Oslo").await), vec!["Booked Oslo"]);
}

#[tokio::test]
async fn test_declarative_todo_bot() {
    init_tracing();
    let registry = ComponentRegistry::with_builtins();
    let dialog = registry.load_dialog(TODO_BOT).unwrap();
    let storage = Arc::new(MemoryStorage::new());
    let manager = DialogManager::new(Arc::new(dialog), storage.clone());

    assert_eq!(texts(&say(&manager, "show").await), vec!["Your list is empty."]);
    assert_eq!(texts(&say(&manager, "add milk").await), vec!["Added milk. You have 1 items."]);
    assert_eq!(texts(&say(&manager, "add eggs").await), vec!["Added eggs. You have 2 items."]);

    let listed = say(&manager, "list").await;
    assert_eq!(texts(&listed), vec!["Your list:\n- milk\n- eggs\n"]);

    assert_eq!(texts(&say(&manager, "remove milk").await), vec!["Removed milk."]);
    assert_eq!(texts(&say(&manager, "remove bread").await), vec!["bread is not on your list."]);
    assert_eq!(
        texts(&say(&manager, "what?").await),
        vec!["Try 'add milk', 'remove milk', 'show' or 'clear'."]
    );

    assert_eq!(texts(&say(&manager, "clear").await), vec!["Clear all 1 items?"]);
    assert_eq!(texts(&say(&manager, "perhaps").await), vec!["Please answer yes or no."]);
    assert_eq!(texts(&say(&manager, "yes").await), vec!["Cleared your list."]);
    assert_eq!(texts(&say(&manager, "show").await), vec!["Your list is empty."]);
}

#[tokio::test]
async fn test_todo_bot_cancel_keeps_user_memory() {
    let registry = ComponentRegistry::with_builtins();
    let manager = DialogManager::new(
        Arc::new(registry.load_dialog(TODO_BOT).unwrap()),
        Arc::new(MemoryStorage::new()),
    );

    say(&manager, "add tea").await;
    assert_eq!(texts(&say(&manager, "clear").await), vec!["Clear all 1 items?"]);

    let cancelled = say(&manager, "stop").await;
    assert_eq!(texts(&cancelled), vec!["Okay, starting over."]);
    assert_eq!(cancelled.status, DialogTurnStatus::Cancelled);

    assert_eq!(texts(&say(&manager, "show").await), vec!["Your list:\n- tea\n"]);
}

#[test]
fn test_dialog_loaded_from_resource() {
    tokio_test::block_on(async {
        let provider = MemoryResourceProvider::new();
        provider.insert("todo.dialog", TODO_BOT).await;
        let registry = ComponentRegistry::with_builtins();
        let dialog = registry.load_resource(&provider, "todo.dialog").await.unwrap();
        assert_eq!(dialog.id(), "todoBot");
        assert_eq!(dialog.triggers().len(), 7);

        let manager = DialogManager::new(Arc::new(dialog), Arc::new(MemoryStorage::new()));
        let outcome = say(&manager, "add bread").await;
        assert_eq!(texts(&outcome), vec!["Added bread. You have 1 items."]);
    });
}
