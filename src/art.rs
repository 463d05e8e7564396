pub fn welcome_message(title: &str) -> String {
    let rule = "=".repeat(title.len() + 8);
    format!(
        "{rule}\n    {title}\n{rule}\ncolumnar log-structured record store, v{}\ntype 'help' for commands\n",
        env!("CARGO_PKG_VERSION")
    )
}
