//! Tests for input dialogs driven through the dialog manager

use adaptive_dialog::actions::{BeginDialog, SendActivity, SetProperty};
use adaptive_dialog::handlers::StorageKeys;
use adaptive_dialog::input::Choice;
use adaptive_dialog::{
    Action, Activity, AdaptiveDialog, ChoiceInput, ConfirmInput, DialogManager, DialogTurnStatus, MemoryStorage,
    NumberInput, OnCondition, RegexRecognizer, Storage, TextInput, TurnOutcome,
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::Arc;

fn activity(text: &str) -> Activity {
    Activity::message(text).with_conversation("test", "c1", "u1")
}

async fn say(manager: &DialogManager, text: &str) -> TurnOutcome {
    manager.on_turn(activity(text)).await.unwrap()
}

fn texts(outcome: &TurnOutcome) -> Vec<&str> {
    outcome.responses.iter().map(Activity::text_or_empty).collect()
}

fn travel_bot(city: TextInput) -> AdaptiveDialog {
    let recognizer = RegexRecognizer::new()
        .with_intent("Help", "^help$")
        .and_then(|r| r.with_intent("Book", "^book"))
        .unwrap();
    let book: Vec<Arc<dyn Action>> = vec![Arc::new(city), Arc::new(SendActivity::new("Booked ${dialog.city}"))];
    AdaptiveDialog::new("travel")
        .with_auto_end_dialog(false)
        .with_recognizer(Arc::new(recognizer))
        .with_trigger(OnCondition::on_intent("Book", Vec::new(), book))
        .with_trigger(OnCondition::on_intent(
            "Help",
            Vec::new(),
            vec![Arc::new(SendActivity::new("I can book trips"))],
        ))
}

fn find_turn_count(value: &Value) -> Option<u64> {
    match value {
        Value::Object(map) => map
            .get("turnCount")
            .and_then(Value::as_u64)
            .or_else(|| map.values().find_map(find_turn_count)),
        Value::Array(items) => items.iter().find_map(find_turn_count),
        _ => None,
    }
}

async fn stored_turn_count(storage: &MemoryStorage) -> Option<u64> {
    let keys = StorageKeys::for_activity("dialog", &activity("x"));
    let items = storage.read(&[keys.dialog_state.clone()]).await.unwrap();
    items.get(&keys.dialog_state).and_then(|item| find_turn_count(&item.value))
}

#[tokio::test]
async fn test_interruption_reprompts_without_counting_a_turn() {
    let storage = Arc::new(MemoryStorage::new());
    let city = TextInput::new("dialog.city").with_prompt("Which city?");
    let manager = DialogManager::new(Arc::new(travel_bot(city)), storage.clone());

    let first = say(&manager, "book").await;
    assert_eq!(texts(&first), vec!["Which city?"]);
    assert_eq!(first.status, DialogTurnStatus::Waiting);
    assert_eq!(stored_turn_count(&storage).await, Some(1));

    let interrupted = say(&manager, "help").await;
    assert_eq!(texts(&interrupted), vec!["I can book trips", "Which city?"]);
    assert_eq!(stored_turn_count(&storage).await, Some(1));

    let answered = say(&manager, "Paris").await;
    assert_eq!(texts(&answered), vec!["Booked Paris"]);
    assert_eq!(stored_turn_count(&storage).await, None);
}

#[tokio::test]
async fn test_input_can_claim_messages_from_parent() {
    let city = TextInput::new("dialog.city")
        .with_prompt("Which city?")
        .with_allow_interruptions("false");
    let manager = DialogManager::new(Arc::new(travel_bot(city)), Arc::new(MemoryStorage::new()));

    say(&manager, "book").await;
    let outcome = say(&manager, "help").await;
    assert_eq!(texts(&outcome), vec!["Booked help"]);
}

#[tokio::test]
async fn test_invalid_values_use_invalid_prompt_then_default() {
    let age = NumberInput::new("user.age")
        .with_prompt("How old are you?")
        .with_invalid_prompt("You must be an adult")
        .with_validation("this.value >= 18")
        .with_max_turn_count(2)
        .with_default_value("30", None);
    let root = AdaptiveDialog::new("root").with_trigger(OnCondition::on_begin_dialog(vec![
        Arc::new(age),
        Arc::new(SendActivity::new("Age ${user.age}")),
    ]));
    let manager = DialogManager::new(Arc::new(root), Arc::new(MemoryStorage::new()));

    assert_eq!(texts(&say(&manager, "hi").await), vec!["How old are you?"]);
    assert_eq!(texts(&say(&manager, "12").await), vec!["You must be an adult"]);

    let last = say(&manager, "twelve").await;
    assert_eq!(texts(&last), vec!["Age 30"]);
    assert_eq!(last.status, DialogTurnStatus::Complete);
}

#[tokio::test]
async fn test_choice_prompt_lists_options_and_accepts_ordinal() {
    let colors = vec![
        Choice::new("red"),
        Choice::new("green").with_synonyms(vec!["lime".into()]),
        Choice::new("blue"),
    ];
    let root = AdaptiveDialog::new("root").with_trigger(OnCondition::on_begin_dialog(vec![
        Arc::new(ChoiceInput::new("dialog.color", colors.clone()).with_prompt("Pick a color")),
        Arc::new(SendActivity::new("first ${dialog.color}")),
        Arc::new(ChoiceInput::new("dialog.other", colors).with_prompt("Another?")),
        Arc::new(SendActivity::new("second ${dialog.other}")),
    ]));
    let manager = DialogManager::new(Arc::new(root), Arc::new(MemoryStorage::new()));

    assert_eq!(texts(&say(&manager, "hi").await), vec!["Pick a color (red, green, or blue)"]);
    assert_eq!(
        texts(&say(&manager, "LIME").await),
        vec!["first green", "Another? (red, green, or blue)"]
    );
    assert_eq!(texts(&say(&manager, "3").await), vec!["second blue"]);
}

#[tokio::test]
async fn test_confirm_reprompts_until_recognized() {
    let root = AdaptiveDialog::new("root").with_trigger(OnCondition::on_begin_dialog(vec![
        Arc::new(
            ConfirmInput::new("dialog.ok")
                .with_prompt("Continue?")
                .with_unrecognized_prompt("Please answer yes or no"),
        ),
        Arc::new(SendActivity::new("ok=${dialog.ok}")),
    ]));
    let manager = DialogManager::new(Arc::new(root), Arc::new(MemoryStorage::new()));

    assert_eq!(texts(&say(&manager, "start").await), vec!["Continue?"]);
    assert_eq!(texts(&say(&manager, "maybe").await), vec!["Please answer yes or no"]);
    assert_eq!(texts(&say(&manager, "yep").await), vec!["ok=true"]);
}

#[tokio::test]
async fn test_parent_trigger_interrupts_nested_dialog() {
    let profile = AdaptiveDialog::new("profile").with_trigger(OnCondition::on_begin_dialog(vec![
        Arc::new(TextInput::new("dialog.name").with_prompt("What is your name?")),
        Arc::new(SetProperty::new("dialog.result", "dialog.name")),
    ]));
    let recognizer = RegexRecognizer::new().with_intent("Help", "^help$").unwrap();
    let root = AdaptiveDialog::new("root")
        .with_recognizer(Arc::new(recognizer))
        .with_trigger(OnCondition::on_begin_dialog(vec![
            Arc::new(BeginDialog::with_dialog(Arc::new(profile)).with_result_property("user.name")),
            Arc::new(SendActivity::new("Hello ${user.name}")),
        ]))
        .with_trigger(OnCondition::on_intent(
            "Help",
            Vec::new(),
            vec![Arc::new(SendActivity::new("I need your name first"))],
        ));
    let manager = DialogManager::new(Arc::new(root), Arc::new(MemoryStorage::new()));

    assert_eq!(texts(&say(&manager, "hi").await), vec!["What is your name?"]);

    let interrupted = say(&manager, "help").await;
    assert_eq!(texts(&interrupted), vec!["I need your name first", "What is your name?"]);
    assert_eq!(interrupted.status, DialogTurnStatus::Waiting);

    let answered = say(&manager, "Ada").await;
    assert_eq!(texts(&answered), vec!["Hello Ada"]);
    assert_eq!(answered.status, DialogTurnStatus::Complete);
}
