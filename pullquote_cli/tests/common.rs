use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub const LOCAL_GO: &str = "package local\n\nfunc fooBar() {\n\t// OK COOL\n}\n";

pub const STALE_README: &str = concat!(
	"hello\n",
	"<!-- pullquote src=local.go start=\"func fooBar\\(\\) \\{\" end=\"}\" -->\n",
	"<!-- /pullquote -->\n",
	"bye\n",
);

pub const FRESH_README: &str = concat!(
	"hello\n",
	"<!-- pullquote src=local.go start=\"func fooBar\\(\\) \\{\" end=\"}\" -->\n",
	"func fooBar() {\n\t// OK COOL\n}\n",
	"<!-- /pullquote -->\n",
	"bye\n",
);

pub fn pullquote_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("pullquote"));
	cmd.env("NO_COLOR", "1").env_remove("PULLQUOTE_LOG").env_remove("DEBUG");
	cmd
}
