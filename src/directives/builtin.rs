//! Built-in directive catalog.
//!
//! Registration order matters: the engine runs directives in this order, so
//! anything another directive depends on is registered before it. Keys are
//! written in the directive pattern dialect (see [`super::pattern`]).

use crate::error::Result;

use super::types::{
    Clock, DirectiveBuilder, DirectiveDefinition, DirectiveKind, FileClass, SystemValue,
    VariableOp,
};

/// Key fragment for an optional `format="..."` argument.
const FORMAT_ARG: &str = r#"(?: format=["']([^"']*)["'])?"#;

/// Key fragment for an optional `locale="..."` argument.
const LOCALE_ARG: &str = r#"(?: locale=["']([^"']*)["'])?"#;

/// Key fragment for an optional `browser="..."` argument.
const BROWSER_ARG: &str = r#"(?: browser="([^"]*)")?"#;

/// Build every built-in directive, in registration order.
pub fn catalog() -> Result<Vec<DirectiveDefinition>> {
    let mut defs = Vec::new();
    for builder in variables()
        .into_iter()
        .chain(context_backed())
        .chain(host_facts())
        .chain(local_facts())
        .chain(host_actions())
        .chain(flow_control())
    {
        defs.push(builder.build()?);
    }
    Ok(defs)
}

fn variables() -> Vec<DirectiveBuilder> {
    use DirectiveKind::Variable;

    vec![
        DirectiveDefinition::builder("reset", "{{reset ([a-zA-Z0-9_]+)}}", Variable(VariableOp::Reset))
            .sequential()
            .example("{{reset storedText}}")
            .description("Resets a persistent variable to its initial value. Replaced with an empty string."),
        DirectiveDefinition::builder("get", "{{get ([a-zA-Z0-9_]+)}}", Variable(VariableOp::Get))
            .sequential()
            .example("{{get storedText}}")
            .description("Replaced with the value of a persistent variable, or an empty string if it does not exist."),
        DirectiveDefinition::builder("delete", "{{delete ([a-zA-Z0-9_]+)}}", Variable(VariableOp::Delete))
            .sequential()
            .example("{{delete storedText}}")
            .description("Deletes a persistent variable. Replaced with an empty string."),
        DirectiveDefinition::builder("vars", "{{vars}}", Variable(VariableOp::List))
            .sequential()
            .example("List these alphabetically: {{vars}}")
            .description("Replaced with the comma-separated names of all persistent variables."),
        DirectiveDefinition::builder("increment", r"{{increment:\s*([a-zA-Z0-9_]+)\s*}}", Variable(VariableOp::Increment))
            .sequential()
            .example("{{increment:counter}}")
            .description("Adds one to a persistent counter variable. Replaced with an empty string."),
        DirectiveDefinition::builder("decrement", r"{{decrement:\s*([a-zA-Z0-9_]+)\s*}}", Variable(VariableOp::Decrement))
            .sequential()
            .example("{{decrement:counter}}")
            .description("Subtracts one from a persistent counter variable. Replaced with an empty string."),
        DirectiveDefinition::builder("set", r"{{set ([a-zA-Z0-9_]+):([\s\S]*)}}", Variable(VariableOp::Set))
            .sequential()
            .expand_body()
            .example("{{set myVariable:Hello World}}")
            .description("Sets a persistent variable, creating it if needed. Replaced with an empty string."),
    ]
}

fn seeded(name: &str, description: &str) -> DirectiveBuilder {
    DirectiveDefinition::builder(name, format!("{{{{{}}}}}", name), DirectiveKind::Seeded)
        .constant()
        .stores_result()
        .example(format!("{{{{{}}}}}", name))
        .description(description)
}

fn context_backed() -> Vec<DirectiveBuilder> {
    vec![
        seeded("input", "Replaced with the input supplied by the caller."),
        DirectiveDefinition::builder("selectedText", "{{selectedText}}", DirectiveKind::Host)
            .constant()
            .stores_result()
            .example("Summarize this: {{selectedText}}")
            .description("Replaced with the currently selected text."),
        DirectiveDefinition::builder("selectedFiles", "{{selectedFiles}}", DirectiveKind::Host)
            .aliases(&["{{selectedFile}}", "{{files}}"])
            .constant()
            .stores_result()
            .example("Compare these files: {{selectedFiles}}")
            .description("Replaced with the comma-separated paths of the selected files."),
        DirectiveDefinition::builder("fileNames", "{{fileNames}}", DirectiveKind::FileNames)
            .constant()
            .result_keys(&["fileNames", "selectedFiles"])
            .example("Sort this list of files by name: {{fileNames}}")
            .description("Replaced with the names of the selected files as a comma-separated list."),
        seeded("metadata", "Replaced with metadata of the selected files."),
        seeded("imageText", "Replaced with text extracted from the selected images."),
        seeded("imageFaces", "Replaced with the number of faces in the selected images."),
        seeded("imageHorizon", "Replaced with the horizon angle of the selected images."),
        seeded("imageAnimals", "Replaced with the animals identified in the selected images."),
        seeded("imageSubjects", "Replaced with the subjects identified in the selected images."),
        seeded("imagePOI", "Replaced with points of interest in the selected images."),
        seeded("imageBarcodes", "Replaced with barcode payloads found in the selected images."),
        seeded("imageRectangles", "Replaced with rectangles detected in the selected images."),
        seeded("pdfRawText", "Replaced with the raw text of the selected PDFs."),
        seeded("pdfOCRText", "Replaced with OCR text of the selected PDFs."),
        DirectiveDefinition::builder("contents", "{{contents}}", DirectiveKind::Contents)
            .aliases(&[
                "{{selectedFileContents}}",
                "{{selectedFilesContents}}",
                "{{selectedFileContent}}",
                "{{selectedFilesContent}}",
                "{{selectedFileText}}",
                "{{selectedFilesText}}",
            ])
            .constant()
            .stores_result()
            .example("Identify the common theme among these files: {{contents}}")
            .description("Replaced with the contents of the selected files."),
        seeded("previousCommand", "Replaced with the name of the previously run command.")
            .aliases(&["{{lastCommand}}"]),
        seeded("previousPrompt", "Replaced with the previous prompt.")
            .aliases(&["{{lastPrompt}}"]),
        seeded("previousResponse", "Replaced with the previous response.")
            .aliases(&["{{lastResponse}}", "{{previousOutput}}", "{{lastOutput}}"]),
    ]
}

fn host_fact(name: &str, aliases: &[&str], description: &str) -> DirectiveBuilder {
    DirectiveDefinition::builder(name, format!("{{{{{}}}}}", name), DirectiveKind::Host)
        .aliases(aliases)
        .constant()
        .stores_result()
        .example(format!("{{{{{}}}}}", name))
        .description(description)
}

fn host_facts() -> Vec<DirectiveBuilder> {
    vec![
        host_fact("clipboardText", &["{{clipboard}}"], "Replaced with the text on the clipboard."),
        host_fact(
            "currentAppName",
            &["{{currentApp}}", "{{currentApplication}}", "{{currentApplicationName}}"],
            "Replaced with the name of the frontmost application.",
        ),
        host_fact(
            "currentAppBundleID",
            &["{{currentApplicationBundleID}}"],
            "Replaced with the bundle identifier of the frontmost application.",
        ),
        host_fact(
            "currentAppPath",
            &["{{currentApplicationPath}}"],
            "Replaced with the path of the frontmost application.",
        ),
        host_fact("currentDirectory", &[], "Replaced with the directory open in the file manager."),
        host_fact("currentURL", &["{{currentTabURL}}"], "Replaced with the URL of the active browser tab.")
            .depends_on(&["currentAppName"]),
        host_fact("currentTabText", &["{{tabText}}"], "Replaced with the visible text of the active browser tab.")
            .depends_on(&["currentAppName", "currentURL"]),
        host_fact("computerName", &[], "Replaced with the pretty name of this computer."),
        host_fact("shortcuts", &[], "Replaced with the names of the installed shortcuts."),
        host_fact("musicTracks", &[], "Replaced with the tracks in the music library."),
        host_fact("currentTrack", &["{{currentSong}}"], "Replaced with the track currently playing."),
        host_fact("lastNote", &[], "Replaced with the text of the most recent note."),
        host_fact("lastEmail", &[], "Replaced with the most recently received email."),
        host_fact(
            "installedApps",
            &["{{apps}}", "{{installedApplications}}", "{{applications}}"],
            "Replaced with the names of the installed applications.",
        ),
        host_fact("screenContent", &[], "Replaced with text recognised on the screen."),
        host_fact("windowContent", &[], "Replaced with text recognised in the active window."),
        host_fact("commands", &[], "Replaced with the names of the saved commands."),
        host_fact("safariTopSites", &[], "Replaced with the browser's top sites."),
        host_fact("safariBookmarks", &[], "Replaced with the browser's bookmarks."),
        host_fact("runningApplications", &[], "Replaced with the names of the running applications."),
        host_fact("location", &["{{currentLocation}}"], "Replaced with the current location."),
        host_fact("todayWeather", &[], "Replaced with today's weather forecast."),
        host_fact("weekWeather", &[], "Replaced with this week's weather forecast."),
        host_fact("todayEvents", &[], "Replaced with today's calendar events."),
        host_fact("weekEvents", &[], "Replaced with this week's calendar events."),
        host_fact("monthEvents", &[], "Replaced with this month's calendar events."),
        host_fact("yearEvents", &[], "Replaced with this year's calendar events."),
        host_fact(
            "todayReminders",
            &["{{todayTasks}}", "{{todayTodos}}"],
            "Replaced with reminders due today.",
        ),
        host_fact(
            "weekReminders",
            &["{{weekTasks}}", "{{weekTodos}}"],
            "Replaced with reminders due this week.",
        ),
        host_fact(
            "monthReminders",
            &["{{monthTasks}}", "{{monthTodos}}"],
            "Replaced with reminders due this month.",
        ),
        host_fact(
            "yearReminders",
            &["{{yearTasks}}", "{{yearTodos}}"],
            "Replaced with reminders due this year.",
        ),
    ]
}

fn local_facts() -> Vec<DirectiveBuilder> {
    use DirectiveKind::{Clock as ClockKind, System};

    vec![
        DirectiveDefinition::builder("user", "{{user}}", System(SystemValue::User))
            .aliases(&["{{username}}"])
            .constant()
            .stores_result()
            .example("Greet {{user}}")
            .description("Replaced with the login name of the current user."),
        DirectiveDefinition::builder("homedir", "{{homedir}}", System(SystemValue::HomeDir))
            .aliases(&["{{homeDirectory}}"])
            .constant()
            .stores_result()
            .example("{{file:{{homedir}}/notes.txt}}")
            .description("Replaced with the home directory of the current user."),
        DirectiveDefinition::builder("hostname", "{{hostname}}", System(SystemValue::Hostname))
            .constant()
            .stores_result()
            .example("Which machine is {{hostname}}?")
            .description("Replaced with the network hostname of this computer."),
        DirectiveDefinition::builder("systemLanguage", "{{systemLanguage}}", System(SystemValue::Language))
            .aliases(&["{{language}}"])
            .constant()
            .stores_result()
            .example("Translate \"Ciao\" to {{systemLanguage}}")
            .description("Replaced with the preferred language of the current user."),
        DirectiveDefinition::builder("date", format!("{{{{date{}}}}}", FORMAT_ARG), ClockKind(Clock::Date))
            .aliases(&[&format!("{{{{currentDate{}}}}}", FORMAT_ARG)])
            .stores_result()
            .example("What happened on {{date format='MMMM d'}} in history?")
            .description("Replaced with the current date in the given format."),
        DirectiveDefinition::builder("day", format!("{{{{day{}}}}}", LOCALE_ARG), ClockKind(Clock::Day))
            .aliases(&[
                &format!("{{{{dayName{}}}}}", LOCALE_ARG),
                &format!("{{{{currentDay{}}}}}", LOCALE_ARG),
                &format!("{{{{currentDayName{}}}}}", LOCALE_ARG),
            ])
            .stores_result()
            .example("Write a generic agenda for {{day}}")
            .description("Replaced with the name of the current day of the week."),
        DirectiveDefinition::builder("time", format!("{{{{time{}}}}}", FORMAT_ARG), ClockKind(Clock::Time))
            .aliases(&[&format!("{{{{currentTime{}}}}}", FORMAT_ARG)])
            .stores_result()
            .example("It's currently {{time format='HH:mm'}}. How long until dinner?")
            .description("Replaced with the current time in the given format."),
        DirectiveDefinition::builder("uuid", "{{uuid}}", DirectiveKind::Uuid)
            .aliases(&["{{UUID}}"])
            .example("{{uuid}}")
            .description("Replaced with a new identifier that has never been issued before."),
        DirectiveDefinition::builder("usedUUIDs", "{{usedUUIDs}}", DirectiveKind::UsedUuids)
            .example("{{usedUUIDs}}")
            .description("Replaced with every identifier issued so far."),
    ]
}

fn host_action(name: &str, key: &str, example: &str, description: &str) -> DirectiveBuilder {
    DirectiveDefinition::builder(name, key, DirectiveKind::Host)
        .example(example)
        .description(description)
}

fn host_actions() -> Vec<DirectiveBuilder> {
    vec![
        host_action(
            "url",
            r"{{(?:url|URL)(?: raw=(true|false))?:([\s\S]*?)}}",
            "{{url:https://example.com}}",
            "Replaced with the visible text of a web page.",
        )
        .aliases(&[r"{{(https?://[^\s{}]*)}}"])
        .expand_body(),
        DirectiveDefinition::builder("file", r"{{file:([\s\S]*?)}}", DirectiveKind::ReadFile)
            .expand_body()
            .example("{{file:~/notes.txt}}")
            .description("Replaced with the contents of a local file."),
        host_action(
            "focusedElement",
            &format!("{{{{focusedElement{}}}}}", BROWSER_ARG),
            "Summarize this: {{focusedElement browser=\"Safari\"}}",
            "Replaced with the text of the focused element in the browser.",
        )
        .aliases(&[
            &format!("{{{{activeElement{}}}}}", BROWSER_ARG),
            &format!("{{{{selectedElement{}}}}}", BROWSER_ARG),
            &format!("{{{{focusedElementText{}}}}}", BROWSER_ARG),
            &format!("{{{{activeElementText{}}}}}", BROWSER_ARG),
            &format!("{{{{selectedElementText{}}}}}", BROWSER_ARG),
        ])
        .depends_on(&["currentAppName"])
        .canonical("{{focusedElement}}"),
        host_action(
            "elementText",
            &format!(r"{{{{textOfElement{}:([\s\S]*)}}}}", BROWSER_ARG),
            "Summarize this: {{elementText:#article}}",
            "Replaced with the text of the first element matching a selector.",
        )
        .aliases(&[&format!(r"{{{{elementText{}:([\s\S]*)}}}}", BROWSER_ARG)])
        .depends_on(&["currentAppName"])
        .expand_body(),
        host_action(
            "elementHTML",
            &format!(r"{{{{HTMLOfElement{}:([\s\S]*)}}}}", BROWSER_ARG),
            "Summarize this: {{elementHTML:#article}}",
            "Replaced with the HTML of the first element matching a selector.",
        )
        .aliases(&[
            &format!(r"{{{{element{}:([\s\S]*)}}}}", BROWSER_ARG),
            &format!(r"{{{{elementHTML{}:([\s\S]*)}}}}", BROWSER_ARG),
        ])
        .depends_on(&["currentAppName"])
        .expand_body(),
        host_action(
            "nearbyLocations",
            r"{{nearbyLocations:([\s\S]*)}}",
            "{{nearbyLocations:coffee}}",
            "Replaced with places near the current location matching a query.",
        )
        .expand_body(),
        host_action(
            "selectFile",
            r"{{selectFile:([\s\S]*?)}}",
            "{{selectFile:~/Documents/report.pdf}}",
            "Selects a file in the file manager. Replaced with an empty string.",
        ),
        host_action(
            "shortcut",
            r"{{shortcut:([^:{}]+?)(?::([\s\S]*))?}}",
            "{{shortcut:My Shortcut:some input}}",
            "Replaced with the output of a shortcut.",
        )
        .expand_body(),
        host_action(
            "command",
            r"{{command:([^:{}]*)(?::([^:{}]*))?(?::([\s\S]*))?}}",
            "{{command:Summarize:PromptLab:some input}}",
            "Runs a saved command. Replaced with an empty string.",
        )
        .expand_body(),
        host_action(
            "youtube",
            r"{{(?:youtube|yt):([\s\S]*?)}}",
            "{{youtube:how to make coffee}}",
            "Replaced with the transcript of a video.",
        )
        .expand_body(),
        host_action(
            "as",
            r"{{(?:as|AS):([\s\S]*)}}",
            "{{as:display dialog \"Hello World\"}}",
            "Replaced with the output of an AppleScript script.",
        )
        .expand_body(),
        host_action(
            "jxa",
            r"{{(?:jxa|JXA):([\s\S]*)}}",
            "{{jxa:Application(\"Music\").currentTrack.name()}}",
            "Replaced with the output of a JavaScript for Automation script.",
        )
        .expand_body(),
        host_action(
            "copy",
            r"{{copy:([\s\S]*)}}",
            "{{copy:Hello World}}",
            "Copies text to the clipboard. Replaced with an empty string.",
        )
        .expand_body(),
        host_action(
            "paste",
            r"{{paste:([\s\S]*)}}",
            "{{paste:Hello World}}",
            "Pastes text into the frontmost application. Replaced with an empty string.",
        )
        .expand_body(),
    ]
}

fn file_condition(name: &str, tag: &str, class: FileClass, description: &str) -> DirectiveBuilder {
    DirectiveDefinition::builder(
        name,
        format!(r"{{{{{}:([\s\S]*?)(?::([\s\S]*))?}}}}", tag),
        DirectiveKind::FileCondition(class),
    )
    .expand_body()
    .example(format!(
        "{{{{{}:Shown if one is selected:Shown otherwise}}}}",
        tag
    ))
    .description(description)
}

fn flow_control() -> Vec<DirectiveBuilder> {
    vec![
        file_condition(
            "contentForTextFiles",
            "textfiles",
            FileClass::Text,
            "Includes the first branch if any text file is selected, else the second.",
        ),
        file_condition(
            "contentForImages",
            "images",
            FileClass::Image,
            "Includes the first branch if any image is selected, else the second.",
        ),
        file_condition(
            "contentForVideos",
            "videos",
            FileClass::Video,
            "Includes the first branch if any video is selected, else the second.",
        ),
        file_condition(
            "contentForAudio",
            "audio",
            FileClass::Audio,
            "Includes the first branch if any audio file is selected, else the second.",
        ),
        file_condition(
            "contentForPDFs",
            "(?:pdf|PDF)",
            FileClass::Pdf,
            "Includes the first branch if any PDF is selected, else the second.",
        )
        .example("{{pdf:Shown if a PDF is selected:Shown otherwise}}"),
        DirectiveDefinition::builder("prompt", r"{{prompt:([\s\S]*)}}", DirectiveKind::SubPrompt)
            .expand_body()
            .example("{{prompt:Summarize {{clipboardText}}}}")
            .description("Replaced with the model's response to a nested prompt."),
        DirectiveDefinition::builder("shell", r"{{shell(?: ([^:{}]*))?:([\s\S]*)}}", DirectiveKind::Shell)
            .expand_body()
            .example("{{shell:echo \"Hello World\"}}")
            .description("Replaced with the output of a shell script, or an empty string if it fails."),
        DirectiveDefinition::builder("cutoff", r"{{cutoff ([0-9]+):([\s\S]*)}}", DirectiveKind::Cutoff)
            .expand_body()
            .example("{{cutoff 5:Hello World}}")
            .description("Keeps only the first n characters of the body."),
        DirectiveDefinition::builder("ignore", r"{{(?:ignore|IGNORE):([\s\S]*)}}", DirectiveKind::Ignore)
            .expand_body()
            .example("{{ignore:{{set seen:yes}}}}")
            .description("Expands the body for its side effects and discards the result."),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn find<'a>(defs: &'a [DirectiveDefinition], name: &str) -> &'a DirectiveDefinition {
        defs.iter().find(|d| d.name == name).unwrap()
    }

    #[test]
    fn test_catalog_builds() {
        let defs = catalog().unwrap();
        assert!(defs.len() > 60);
    }

    #[test]
    fn test_keys_and_names_are_unique() {
        let defs = catalog().unwrap();
        let keys: HashSet<&str> = defs.iter().map(|d| d.key.as_str()).collect();
        let names: HashSet<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(keys.len(), defs.len());
        assert_eq!(names.len(), defs.len());
    }

    #[test]
    fn test_dependencies_resolve_and_come_first() {
        let defs = catalog().unwrap();
        for (idx, def) in defs.iter().enumerate() {
            for dep in &def.dependencies {
                let dep_idx = defs.iter().position(|d| &d.name == dep).unwrap();
                assert!(dep_idx < idx, "{} depends on later {}", def.name, dep);
            }
        }
    }

    #[test]
    fn test_variable_family_is_sequential() {
        let defs = catalog().unwrap();
        let sequential: Vec<&str> = defs
            .iter()
            .filter(|d| d.sequential)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            sequential,
            vec!["reset", "get", "delete", "vars", "increment", "decrement", "set"]
        );
    }

    #[test]
    fn test_canonical_forms_match_primary_pattern() {
        let defs = catalog().unwrap();
        for def in defs.iter().filter(|d| d.capture_count() == 0) {
            assert!(def.matches_primary(&def.canonical), "{}", def.name);
        }
        let focused = find(&defs, "focusedElement");
        assert!(focused.matches_primary(&focused.canonical));
    }

    #[test]
    fn test_patterns_match_examples() {
        let defs = catalog().unwrap();
        assert!(find(&defs, "get").matches("{{get counter}}"));
        assert!(find(&defs, "set").matches("{{set greeting:Hello: World}}"));
        assert!(find(&defs, "increment").matches("{{increment:counter}}"));
        assert!(find(&defs, "date").matches("{{date format=\"yyyy\"}}"));
        assert!(find(&defs, "date").matches("{{currentDate}}"));
        assert!(find(&defs, "day").matches("{{dayName locale='en-GB'}}"));
        assert!(find(&defs, "url").matches("{{https://example.com/a?b=c}}"));
        assert!(find(&defs, "contentForPDFs").matches("{{PDF:yes:no}}"));
        assert!(find(&defs, "ignore").matches("{{IGNORE:anything}}"));
        assert!(find(&defs, "shell").matches("{{shell /bin/bash:echo hi}}"));
        assert!(!find(&defs, "get").matches("{{get two words}}"));
    }

    #[test]
    fn test_file_condition_captures() {
        let defs = catalog().unwrap();
        let def = find(&defs, "contentForTextFiles");
        let caps = def.captures("{{textfiles:yes:no}}").unwrap();
        assert_eq!(caps[1], "yes");
        assert_eq!(caps[2], "no");

        let caps = def.captures("{{textfiles:only}}").unwrap();
        assert_eq!(caps[1], "only");
        assert_eq!(caps[2], "");
    }

    #[test]
    fn test_shell_captures() {
        let defs = catalog().unwrap();
        let caps = find(&defs, "shell")
            .captures("{{shell /bin/bash:echo a:b}}")
            .unwrap();
        assert_eq!(caps[1], "/bin/bash");
        assert_eq!(caps[2], "echo a:b");
    }
}
