//! Tests for action execution inside adaptive dialogs

use adaptive_dialog::actions::{
    ArrayChangeType, BeginDialog, BreakLoop, Case, CodeAction, ContinueLoop, DeleteProperty, EditActions, EditArray,
    EmitEvent, Foreach, ForeachPage, GotoAction, IfCondition, InitProperty, RepeatDialog, ReplaceDialog, SendActivity,
    SendList, SetProperty, SwitchCondition,
};
use adaptive_dialog::{
    Action, ActionChangeType, Activity, AdaptiveDialog, ControlFlowError, DialogContext, DialogError, DialogManager,
    DialogSet, DialogTurnStatus, MemoryStorage, OnCondition, TextInput, TurnContext, TurnOutcome, TurnServices,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

fn bot(root: AdaptiveDialog) -> DialogManager {
    DialogManager::new(Arc::new(root), Arc::new(MemoryStorage::new()))
}

fn on_begin(actions: Vec<Arc<dyn Action>>) -> AdaptiveDialog {
    AdaptiveDialog::new("root").with_trigger(OnCondition::on_begin_dialog(actions))
}

async fn say(manager: &DialogManager, text: &str) -> Result<TurnOutcome, DialogError> {
    manager
        .on_turn(Activity::message(text).with_conversation("test", "conversation", "user"))
        .await
}

fn texts(outcome: &TurnOutcome) -> Vec<String> {
    outcome
        .responses
        .iter()
        .map(|activity| activity.text_or_empty().to_string())
        .collect()
}

#[tokio::test]
async fn test_actions_run_in_order() {
    let manager = bot(on_begin(vec![
        Arc::new(SendActivity::new("one")),
        Arc::new(SendActivity::new("two")),
        Arc::new(SetProperty::new("dialog.result", "'done'")),
        Arc::new(SendActivity::new("three")),
    ]));

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(outcome.status, DialogTurnStatus::Complete);
    assert_eq!(outcome.result, Some(json!("done")));
    assert_eq!(texts(&outcome), vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_break_from_nested_scope_ends_loop() {
    let manager = bot(on_begin(vec![
        Arc::new(SetProperty::new("dialog.items", "[1, 2, 3]")),
        Arc::new(Foreach::new(
            "dialog.items",
            vec![
                Arc::new(IfCondition::new(
                    "dialog.foreach.value == 2",
                    vec![Arc::new(BreakLoop::new())],
                    Vec::new(),
                )),
                Arc::new(SendActivity::new("item ${dialog.foreach.value}")),
            ],
        )),
        Arc::new(SendActivity::new("after")),
    ]));

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(texts(&outcome), vec!["item 1", "after"]);
}

#[tokio::test]
async fn test_goto_skips_ahead_and_into_branches() {
    let manager = bot(on_begin(vec![
        Arc::new(SendActivity::new("a")),
        Arc::new(GotoAction::new("deep")),
        Arc::new(SendActivity::new("skipped")),
        Arc::new(IfCondition::new(
            "false",
            vec![
                Arc::new(SendActivity::new("also skipped")),
                Arc::new(SendActivity::new("inner").with_id("deep")),
            ],
            Vec::new(),
        )),
        Arc::new(SendActivity::new("end")),
    ]));

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(texts(&outcome), vec!["a", "inner", "end"]);
}

#[tokio::test]
async fn test_unmatched_goto_is_a_control_flow_error() {
    let manager = bot(on_begin(vec![Arc::new(GotoAction::new("nowhere"))]));

    let err = say(&manager, "hi").await.err().unwrap();
    assert!(matches!(
        err,
        DialogError::ControlFlow(ControlFlowError::GotoTargetNotFound(ref target)) if target == "nowhere"
    ));
}

#[tokio::test]
async fn test_break_outside_loop_is_an_error() {
    let manager = bot(on_begin(vec![Arc::new(BreakLoop::new())]));

    let err = say(&manager, "hi").await.err().unwrap();
    assert!(matches!(err, DialogError::ControlFlow(ControlFlowError::BreakOutsideLoop)));
}

#[tokio::test]
async fn test_error_trigger_handles_turn_failure() {
    let root = on_begin(vec![Arc::new(GotoAction::new("missing"))]).with_trigger(OnCondition::on_error(vec![
        Arc::new(SendActivity::new("Oops: ${turn.dialogEvent.value.kind}")),
    ]));
    let manager = bot(root);

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(texts(&outcome), vec!["Oops: controlFlow"]);
    assert_eq!(outcome.status, DialogTurnStatus::Complete);
}

#[tokio::test]
async fn test_switch_runs_only_matching_case() {
    for (value, expected) in [("'22'", vec!["B", "done"]), ("'23'", vec!["done"]), ("22", vec!["B", "done"])] {
        let manager = bot(on_begin(vec![
            Arc::new(SetProperty::new("dialog.choice", value)),
            Arc::new(SwitchCondition::new(
                "dialog.choice",
                vec![
                    Case::new("21", vec![Arc::new(SendActivity::new("A"))]),
                    Case::new("22", vec![Arc::new(SendActivity::new("B"))]),
                ],
                Vec::new(),
            )),
            Arc::new(SendActivity::new("done")),
        ]));

        let outcome = say(&manager, "hi").await.unwrap();
        assert_eq!(texts(&outcome), expected, "switch on {value}");
    }
}

#[tokio::test]
async fn test_edit_array_push_and_pop() {
    let manager = bot(on_begin(vec![
        Arc::new(InitProperty::new("user.todos", "array")),
        Arc::new(EditArray::new(ArrayChangeType::Push, "user.todos").with_value("'milk'")),
        Arc::new(EditArray::new(ArrayChangeType::Push, "user.todos").with_value("'eggs'")),
        Arc::new(EditArray::new(ArrayChangeType::Pop, "user.todos").with_result_property("dialog.popped")),
        Arc::new(SendActivity::new("${dialog.popped} ${count(user.todos)}")),
    ]));

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(texts(&outcome), vec!["eggs 1"]);
}

#[tokio::test]
async fn test_init_property_rejects_unknown_type_before_writing() {
    let root = on_begin(vec![
        Arc::new(SetProperty::new("user.x", "5")),
        Arc::new(InitProperty::new("user.x", "list")),
    ]);
    let mut set = DialogSet::new();
    set.add(Arc::new(root));

    let mut turn = TurnContext::new(Activity::message("hi"), Arc::new(TurnServices::default()));
    let mut dc = DialogContext::new(&mut turn, Arc::new(set));
    let err = dc.begin_dialog("root", None).await.err().unwrap();

    assert_eq!(err.kind(), "configuration");
    assert_eq!(turn.memory.user["x"], json!(5));
}

#[tokio::test]
async fn test_delete_property_requires_adaptive_dialog() {
    let action = DeleteProperty::new("user.x");
    let id = action.id().to_string();
    let mut set = DialogSet::new();
    set.add(Arc::new(action));

    let mut turn = TurnContext::new(Activity::message("hi"), Arc::new(TurnServices::default()));
    let mut dc = DialogContext::new(&mut turn, Arc::new(set));
    let err = dc.begin_dialog(&id, None).await.err().unwrap();
    assert_eq!(err.kind(), "contextMisuse");
}

#[tokio::test]
async fn test_disabled_actions_are_skipped() {
    let manager = bot(on_begin(vec![
        Arc::new(SetProperty::new("dialog.quiet", "true")),
        Arc::new(SendActivity::new("hello").with_disabled("dialog.quiet")),
        Arc::new(SendActivity::new("hello")),
    ]));

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(texts(&outcome), vec!["hello"]);
}

#[tokio::test]
async fn test_emitted_event_runs_after_current_scope() {
    let root = on_begin(vec![
        Arc::new(
            EmitEvent::new("custom")
                .with_bubble(true)
                .with_result_property("dialog.handled"),
        ),
        Arc::new(SendActivity::new("handled=${dialog.handled}")),
    ])
    .with_trigger(OnCondition::on_event("custom", vec![Arc::new(SendActivity::new("got custom"))]));
    let manager = bot(root);

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(texts(&outcome), vec!["handled=true", "got custom"]);
}

#[tokio::test]
async fn test_continue_skips_rest_of_iteration() {
    let manager = bot(on_begin(vec![
        Arc::new(SetProperty::new("dialog.items", "[1, 2, 3]")),
        Arc::new(Foreach::new(
            "dialog.items",
            vec![
                Arc::new(IfCondition::new(
                    "dialog.foreach.value == 2",
                    vec![Arc::new(ContinueLoop::new())],
                    Vec::new(),
                )),
                Arc::new(SendActivity::new("item ${dialog.foreach.value}")),
            ],
        )),
        Arc::new(SendActivity::new("after")),
    ]));

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(texts(&outcome), vec!["item 1", "item 3", "after"]);
}

#[tokio::test]
async fn test_foreach_page_publishes_pages_in_order() {
    let manager = bot(on_begin(vec![
        Arc::new(SetProperty::new("dialog.items", "['a', 'b', 'c', 'd', 'e']")),
        Arc::new(ForeachPage::new(
            "dialog.items",
            2,
            vec![Arc::new(SendActivity::new(
                "page ${dialog.foreach.pageindex}: ${count(dialog.foreach.page)} starting ${dialog.foreach.page[0]}",
            ))],
        )),
    ]));

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(
        texts(&outcome),
        vec!["page 0: 2 starting a", "page 1: 2 starting c", "page 2: 1 starting e"]
    );
}

#[tokio::test]
async fn test_long_foreach_runs_in_one_turn() {
    let fill = CodeAction::new("fill", |dc, _| {
        dc.set_value("dialog.items", Value::Array((0..1500).map(Value::from).collect()))?;
        Ok(None)
    });
    let manager = bot(on_begin(vec![
        Arc::new(fill),
        Arc::new(Foreach::new(
            "dialog.items",
            vec![Arc::new(SetProperty::new("dialog.last", "dialog.foreach.value"))],
        )),
        Arc::new(SendActivity::new("last ${dialog.last} at ${dialog.foreach.index}")),
    ]));

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(texts(&outcome), vec!["last 1499 at 1499"]);
    assert_eq!(outcome.status, DialogTurnStatus::Complete);
}

#[tokio::test]
async fn test_foreach_resumes_at_next_item_after_input() {
    let manager = bot(on_begin(vec![
        Arc::new(SetProperty::new("dialog.items", "['tea', 'milk']")),
        Arc::new(Foreach::new(
            "dialog.items",
            vec![
                Arc::new(
                    TextInput::new("dialog.amount")
                        .with_prompt("How much ${dialog.foreach.value}?")
                        .with_always_prompt(true),
                ),
                Arc::new(SendActivity::new("${dialog.foreach.value}: ${dialog.amount}")),
            ],
        )),
        Arc::new(SendActivity::new("order complete")),
    ]));

    let first = say(&manager, "order").await.unwrap();
    assert_eq!(texts(&first), vec!["How much tea?"]);
    assert_eq!(first.status, DialogTurnStatus::Waiting);

    let second = say(&manager, "two cups").await.unwrap();
    assert_eq!(texts(&second), vec!["tea: two cups", "How much milk?"]);

    let third = say(&manager, "a pint").await.unwrap();
    assert_eq!(texts(&third), vec!["milk: a pint", "order complete"]);
    assert_eq!(third.status, DialogTurnStatus::Complete);
}

#[tokio::test]
async fn test_actions_differing_only_in_result_property_both_run() {
    let manager = bot(on_begin(vec![
        Arc::new(EditArray::new(ArrayChangeType::Push, "dialog.l").with_value("1")),
        Arc::new(EditArray::new(ArrayChangeType::Push, "dialog.l").with_value("2")),
        Arc::new(EditArray::new(ArrayChangeType::Pop, "dialog.l").with_result_property("dialog.a")),
        Arc::new(EditArray::new(ArrayChangeType::Pop, "dialog.l").with_result_property("dialog.b")),
        Arc::new(SendActivity::new("a=${dialog.a} b=${dialog.b}")),
    ]));

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(texts(&outcome), vec!["a=2 b=1"]);
}

#[tokio::test]
async fn test_inputs_on_same_property_keep_their_prompts() {
    let manager = bot(on_begin(vec![
        Arc::new(TextInput::new("dialog.name").with_prompt("First prompt?")),
        Arc::new(
            TextInput::new("dialog.name")
                .with_prompt("Second prompt?")
                .with_always_prompt(true),
        ),
        Arc::new(SendActivity::new("name ${dialog.name}")),
    ]));

    assert_eq!(texts(&say(&manager, "hi").await.unwrap()), vec!["First prompt?"]);
    assert_eq!(texts(&say(&manager, "Ada").await.unwrap()), vec!["Second prompt?"]);
    assert_eq!(texts(&say(&manager, "Grace").await.unwrap()), vec!["name Grace"]);
}

#[test]
fn test_colliding_ids_are_renamed_at_registration() {
    let first: Arc<dyn Action> = Arc::new(EmitEvent::new("ping").with_value("1"));
    let second: Arc<dyn Action> = Arc::new(EmitEvent::new("ping").with_value("2"));
    assert_eq!(first.id(), second.id());
    let taken = first.id().to_string();

    let mut set = DialogSet::new();
    set.add(first.clone()).add(second.clone()).add(first.clone());

    assert_eq!(set.len(), 2);
    assert_eq!(first.id(), taken);
    assert_eq!(second.id(), format!("{taken}2"));
    assert!(Arc::ptr_eq(&set.get(second.id()).unwrap(), &second));
}

#[tokio::test]
async fn test_repeat_dialog_restarts_enclosing_dialog() {
    let manager = bot(on_begin(vec![
        Arc::new(EditArray::new(ArrayChangeType::Push, "user.runs").with_value("'run'")),
        Arc::new(IfCondition::new(
            "count(user.runs) < 3",
            vec![Arc::new(RepeatDialog::new())],
            Vec::new(),
        )),
        Arc::new(SendActivity::new("ran ${count(user.runs)} times")),
    ]));

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(texts(&outcome), vec!["ran 3 times"]);
    assert_eq!(outcome.status, DialogTurnStatus::Complete);
}

#[tokio::test]
async fn test_replace_dialog_hands_result_to_caller() {
    let farewell = AdaptiveDialog::new("farewell").with_trigger(OnCondition::on_begin_dialog(vec![
        Arc::new(SendActivity::new("bye ${dialog.options.name}")),
        Arc::new(SetProperty::new("dialog.result", "'replaced'")),
    ]));
    let main = AdaptiveDialog::new("main").with_trigger(OnCondition::on_begin_dialog(vec![
        Arc::new(SendActivity::new("hello")),
        Arc::new(ReplaceDialog::new("farewell").with_option("name", "'Ada'")),
        Arc::new(SendActivity::new("unreachable")),
    ]));
    let root = on_begin(vec![
        Arc::new(BeginDialog::with_dialog(Arc::new(main)).with_result_property("dialog.outcome")),
        Arc::new(SendActivity::new("outcome ${dialog.outcome}")),
    ])
    .with_dialog(Arc::new(farewell));
    let manager = bot(root);

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(texts(&outcome), vec!["hello", "bye Ada", "outcome replaced"]);
}

#[tokio::test]
async fn test_edit_actions_change_plan_after_current_scope() {
    let manager = bot(on_begin(vec![
        Arc::new(EditActions::new(
            ActionChangeType::AppendActions,
            vec![Arc::new(SendActivity::new("appended"))],
        )),
        Arc::new(EditActions::new(
            ActionChangeType::InsertActions,
            vec![Arc::new(SendActivity::new("inserted"))],
        )),
        Arc::new(SendActivity::new("body")),
    ]));

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(texts(&outcome), vec!["body", "inserted", "appended"]);
}

#[tokio::test]
async fn test_send_list_renders_arrays_and_objects() {
    let manager = bot(on_begin(vec![
        Arc::new(SetProperty::new("dialog.items", "['tea', 'milk']")),
        Arc::new(
            SendList::new("dialog.items")
                .with_message_template("Items:\n${list}")
                .with_item_template("* ${item}\n"),
        ),
        Arc::new(CodeAction::new("stock", |dc, _| {
            dc.set_value("dialog.stock", json!({"milk": 2, "tea": 1}))?;
            Ok(None)
        })),
        Arc::new(SendList::new("dialog.stock").with_item_template("${key}=${item};")),
    ]));

    let outcome = say(&manager, "hi").await.unwrap();
    assert_eq!(texts(&outcome), vec!["Items:\n* tea\n* milk\n", "milk=2;tea=1;"]);
}
